//! The append-only log the consumer reads from and the writer appends to.
//!
//! [`MessageStore`] is the only contract the rest of the crate relies on.
//! Two implementations ship with the crate:
//!
//! - [`MemoryStore`]: in-process, used by tests and demos
//! - [`PostgresStore`]: Message DB on PostgreSQL

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::message_db::{
    error::Result,
    types::{Message, WriteMessage},
};

pub use memory::MemoryStore;
pub use postgres::{MessageDbConfig, PostgresStore};

/// Default maximum number of messages returned by one `get`
pub const DEFAULT_BATCH_SIZE: i64 = 1000;

/// Read/write contract of the message log
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Read messages at or after `global_position`, ascending by global position.
    ///
    /// A category name (no `-`) reads every stream in the category. An empty
    /// result means the reader has caught up.
    async fn get(&self, stream_name: &str, global_position: i64) -> Result<Vec<Message>>;

    /// Atomically append `records` to `stream_name`.
    ///
    /// With `expected_version = Some(v)` the write only succeeds if the
    /// stream's current version is `v` (`-1` for a stream that does not exist
    /// yet). Returns the stream position of the last record written.
    async fn write(
        &self,
        records: Vec<WriteMessage>,
        stream_name: &str,
        expected_version: Option<i64>,
    ) -> Result<i64>;

    /// The most recent message of a stream, if any
    async fn get_last(&self, stream_name: &str) -> Result<Option<Message>>;
}
