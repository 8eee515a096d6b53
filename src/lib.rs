// Message store client and consumption engine
pub mod message_db;
