use std::sync::Arc;

use tracing::{debug, info};

use crate::message_db::{
    error::{Error, Result},
    store::MessageStore,
    types::WriteMessage,
};

const OPERATION: &str = "messaging write";

/// Validating, logging writer
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use message_consumer::message_db::messaging::Writer;
/// use message_consumer::message_db::store::MemoryStore;
/// use message_consumer::message_db::types::WriteMessage;
///
/// # tokio_test::block_on(async {
/// let writer = Writer::new(Arc::new(MemoryStore::new()));
/// let position = writer
///     .write_initial(vec![WriteMessage::new("Opened")], "account-1")
///     .await
///     .unwrap();
/// assert_eq!(position, 0);
/// # });
/// ```
#[derive(Clone)]
pub struct Writer {
    store: Arc<dyn MessageStore>,
}

impl Writer {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Append records to a stream, optionally guarded by an expected version
    ///
    /// Returns the stream position of the last record written.
    pub async fn write(
        &self,
        records: Vec<WriteMessage>,
        stream_name: &str,
        expected_version: Option<i64>,
    ) -> Result<i64> {
        debug!(
            count = records.len(),
            ?expected_version,
            stream_name,
            "messaging write: starting"
        );

        validate(&records)?;
        let types: Vec<String> = records.iter().map(|r| r.message_type.clone()).collect();

        let position = self.store.write(records, stream_name, expected_version).await?;

        info!(
            count = types.len(),
            ?expected_version,
            stream_name,
            ?types,
            "messaging write: successful"
        );

        Ok(position)
    }

    /// Write the first records of a stream; fails if the stream already exists
    pub async fn write_initial(&self, records: Vec<WriteMessage>, stream_name: &str) -> Result<i64> {
        self.write(records, stream_name, Some(-1)).await
    }
}

fn validate(records: &[WriteMessage]) -> Result<()> {
    if records.is_empty() {
        return Err(Error::operation(
            OPERATION,
            "one or more messages were invalid",
            "no messages given",
        ));
    }

    if let Some(invalid) = records.iter().find(|r| r.message_type.trim().is_empty()) {
        return Err(Error::operation(
            OPERATION,
            "one or more messages were invalid",
            format!("message {} has no type", invalid.id),
        ));
    }

    Ok(())
}
