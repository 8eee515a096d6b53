use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::message_db::{
    error::{Error, Result},
    store::MessageStore,
    types::WriteMessage,
    utils::category,
};

/// Durable checkpoint storage, keyed by the consumed stream name
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Last checkpointed global position, if one was ever written
    async fn get(&self, stream_name: &str) -> Result<Option<i64>>;

    /// Record `global_position` as fully processed
    async fn put(&self, stream_name: &str, global_position: i64) -> Result<()>;
}

/// Checkpoints kept as `PositionUpdated` messages in the message store itself
///
/// Position streams follow the naming convention
/// `{category}:position-{consumer_name}`.
pub struct StorePositions {
    store: Arc<dyn MessageStore>,
    consumer_name: String,
}

impl StorePositions {
    pub fn new(store: Arc<dyn MessageStore>, consumer_name: impl Into<String>) -> Self {
        Self {
            store,
            consumer_name: consumer_name.into(),
        }
    }

    /// Name of the stream holding checkpoints for `stream_name`
    ///
    /// ```
    /// use std::sync::Arc;
    /// use message_consumer::message_db::consumer::StorePositions;
    /// use message_consumer::message_db::store::MemoryStore;
    ///
    /// let positions = StorePositions::new(Arc::new(MemoryStore::new()), "worker-1");
    /// assert_eq!(positions.position_stream_name("account-123"), "account:position-worker-1");
    /// assert_eq!(positions.position_stream_name("account:command"), "account:command:position-worker-1");
    /// ```
    pub fn position_stream_name(&self, stream_name: &str) -> String {
        format!("{}:position-{}", category(stream_name), self.consumer_name)
    }
}

#[async_trait]
impl PositionStore for StorePositions {
    async fn get(&self, stream_name: &str) -> Result<Option<i64>> {
        let last = self
            .store
            .get_last(&self.position_stream_name(stream_name))
            .await?;

        Ok(last.and_then(|msg| msg.data.get("position").and_then(|v| v.as_i64())))
    }

    async fn put(&self, stream_name: &str, global_position: i64) -> Result<()> {
        let record = WriteMessage::new("PositionUpdated")
            .with_data(json!({ "position": global_position }));

        self.store
            .write(vec![record], &self.position_stream_name(stream_name), None)
            .await?;
        Ok(())
    }
}

/// Coalesces checkpoint writes for one consumer
///
/// Only every `update_interval`-th [`put`](Self::put) reaches the position
/// store. After an unclean restart up to `update_interval - 1` handled
/// messages are delivered again, so handlers must tolerate redelivery.
pub struct PositionTracker {
    positions: Arc<dyn PositionStore>,
    stream_name: String,
    consumer_name: String,
    update_interval: usize,
    count: usize,
    last_position: Option<i64>,
}

impl PositionTracker {
    pub fn new(
        positions: Arc<dyn PositionStore>,
        stream_name: impl Into<String>,
        consumer_name: impl Into<String>,
        update_interval: usize,
    ) -> Self {
        Self {
            positions,
            stream_name: stream_name.into(),
            consumer_name: consumer_name.into(),
            update_interval: update_interval.max(1),
            count: 0,
            last_position: None,
        }
    }

    /// Read the last persisted checkpoint
    pub async fn read(&self) -> Result<Option<i64>> {
        self.positions.get(&self.stream_name).await
    }

    /// Note one successfully processed message.
    ///
    /// The counter is only reset after a successful write, so a failed write
    /// is retried by the next call.
    pub async fn put(&mut self, global_position: i64) -> Result<()> {
        self.last_position = Some(global_position);
        self.count += 1;

        if self.count >= self.update_interval {
            self.write(global_position).await?;
            self.count = 0;
        }

        Ok(())
    }

    /// Persist the last seen position now, regardless of the interval
    pub async fn flush(&mut self) -> Result<()> {
        match self.last_position {
            Some(position) if self.count > 0 => {
                self.write(position).await?;
                self.count = 0;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn write(&self, global_position: i64) -> Result<()> {
        self.positions
            .put(&self.stream_name, global_position)
            .await
            .map_err(|inner| {
                Error::operation(
                    format!("{} consumer", self.consumer_name),
                    "error updating consumer position",
                    inner,
                )
            })?;

        debug!(
            stream_name = %self.stream_name,
            global_position,
            "{} consumer: position updated",
            self.consumer_name
        );
        Ok(())
    }

    /// Puts since the last persisted write
    pub fn pending(&self) -> usize {
        self.count
    }

    pub fn last_position(&self) -> Option<i64> {
        self.last_position
    }
}
