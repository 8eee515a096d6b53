use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{MessageStore, DEFAULT_BATCH_SIZE};
use crate::message_db::{
    error::{Error, Result},
    types::{Message, WriteMessage},
    utils::{category, is_category},
};

/// In-process message log
///
/// Global and stream positions both start at 0. All reads and writes go
/// through one lock, so every write is atomic with respect to readers.
///
/// # Example
///
/// ```
/// use message_consumer::message_db::store::{MemoryStore, MessageStore};
/// use message_consumer::message_db::types::WriteMessage;
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
/// store.write(vec![WriteMessage::new("Opened")], "account-1", Some(-1)).await.unwrap();
///
/// let messages = store.get("account", 0).await.unwrap();
/// assert_eq!(messages.len(), 1);
/// # });
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    messages: RwLock<Vec<Message>>,
    batch_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
            batch_size: DEFAULT_BATCH_SIZE as usize,
        }
    }

    /// Limit the number of messages returned by one `get` (builder pattern)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Current version of a stream: the position of its last message
    pub async fn stream_version(&self, stream_name: &str) -> Option<i64> {
        let messages = self.messages.read().await;
        version_of(&messages, stream_name)
    }

    /// Total number of messages across all streams
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn version_of(messages: &[Message], stream_name: &str) -> Option<i64> {
    messages
        .iter()
        .rev()
        .find(|m| m.stream_name == stream_name)
        .map(|m| m.position)
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn get(&self, stream_name: &str, global_position: i64) -> Result<Vec<Message>> {
        let whole_category = is_category(stream_name);
        let messages = self.messages.read().await;

        let batch = messages
            .iter()
            .filter(|m| m.global_position >= global_position)
            .filter(|m| {
                if whole_category {
                    category(&m.stream_name) == stream_name
                } else {
                    m.stream_name == stream_name
                }
            })
            .take(self.batch_size)
            .cloned()
            .collect();

        Ok(batch)
    }

    async fn write(
        &self,
        records: Vec<WriteMessage>,
        stream_name: &str,
        expected_version: Option<i64>,
    ) -> Result<i64> {
        if records.is_empty() {
            return Err(Error::Validation(format!(
                "no messages to write to stream '{}'",
                stream_name
            )));
        }

        let mut messages = self.messages.write().await;
        let current = version_of(&messages, stream_name);

        if let Some(expected) = expected_version {
            if current.unwrap_or(-1) != expected {
                return Err(Error::Concurrency {
                    stream_name: stream_name.to_string(),
                    expected_version: expected,
                    actual_version: current,
                });
            }
        }

        let mut position = current.unwrap_or(-1);
        for record in records {
            position += 1;
            let global_position = messages.len() as i64;
            messages.push(Message {
                id: record.id,
                stream_name: stream_name.to_string(),
                message_type: record.message_type,
                data: record.data,
                metadata: record.metadata,
                position,
                global_position,
                time: Utc::now(),
            });
        }

        Ok(position)
    }

    async fn get_last(&self, stream_name: &str) -> Result<Option<Message>> {
        let messages = self.messages.read().await;
        Ok(messages
            .iter()
            .rev()
            .find(|m| m.stream_name == stream_name)
            .cloned())
    }
}
