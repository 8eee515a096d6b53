use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A record to append to a stream
///
/// The target stream and the expected version are supplied to the write call,
/// so one batch of records always lands on a single stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteMessage {
    /// Unique identifier for the message
    pub id: Uuid,

    /// Message type/class name (e.g., "Withdrawn", "DepositRequested")
    #[serde(rename = "type")]
    pub message_type: String,

    /// Business data payload
    #[serde(default)]
    pub data: Value,

    /// Infrastructural/mechanical data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl WriteMessage {
    /// Create a new record with a random id and an empty data object
    ///
    /// # Example
    ///
    /// ```
    /// use message_consumer::message_db::types::WriteMessage;
    /// use serde_json::json;
    ///
    /// let msg = WriteMessage::new("Withdrawn")
    ///     .with_data(json!({ "amount": 50, "currency": "USD" }))
    ///     .with_metadata(json!({ "correlation_id": "xyz-789" }));
    /// assert_eq!(msg.message_type, "Withdrawn");
    /// ```
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            message_type: message_type.into(),
            data: Value::Object(serde_json::Map::new()),
            metadata: None,
        }
    }

    /// Set the id (builder pattern)
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Set the data payload (builder pattern)
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Set the metadata (builder pattern)
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// An immutable record read from the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,

    /// Name of the stream containing the message
    pub stream_name: String,

    #[serde(rename = "type")]
    pub message_type: String,

    pub data: Value,

    pub metadata: Option<Value>,

    /// Sequence number within the stream (0-based)
    pub position: i64,

    /// Strictly increasing ordering cursor across every stream
    pub global_position: i64,

    /// UTC timestamp when the message was written
    pub time: DateTime<Utc>,
}

impl Message {
    /// Get the correlation ID from metadata if present
    pub fn correlation_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("correlation_id"))
            .and_then(|v| v.as_str())
    }
}
