//! Write front-end over a [`MessageStore`](crate::message_db::store::MessageStore).

pub mod write;

pub use write::Writer;
