use thiserror::Error;

/// Result type for message store and consumer operations
pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the store, the writer and the consumer
#[derive(Debug, Error)]
pub enum Error {
    /// Expected version did not match the stream's current version
    #[error("Concurrency error on stream '{stream_name}': expected version {expected_version}, actual version {actual_version:?}")]
    Concurrency {
        stream_name: String,
        expected_version: i64,
        actual_version: Option<i64>,
    },

    /// Invalid input data or configuration
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database unreachable or authentication failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// SQL errors, constraint violations, malformed rows
    #[error("Database error: {0}")]
    Database(String),

    /// Connection pool issues
    #[error("Pool error: {0}")]
    Pool(String),

    /// Raised by a message handler
    #[error("Handler error: {0}")]
    Handler(String),

    /// Strict registry received a message type with no handlers
    #[error("{consumer} consumer: unhandled message type ({message_type})")]
    UnhandledMessageType {
        consumer: String,
        message_type: String,
    },

    /// A named operation failed because of an inner error
    #[error("{operation}: {message}")]
    Operation {
        operation: String,
        message: String,
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Create a handler error
    pub fn handler(msg: impl Into<String>) -> Self {
        Error::Handler(msg.into())
    }

    /// Wrap an inner error as a failure of a named operation
    pub fn operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::Operation {
            operation: operation.into(),
            message: message.into(),
            source: source.into(),
        }
    }
}

impl From<tokio_postgres::Error> for Error {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db_error) => {
                Error::Database(format!("{}: {}", db_error.code().code(), db_error.message()))
            }
            None => Error::Database(err.to_string()),
        }
    }
}

impl From<deadpool_postgres::PoolError> for Error {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Error::Pool(err.to_string())
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Error::Validation(format!("Invalid UUID: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Validation(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_concurrency_error_display() {
        let err = Error::Concurrency {
            stream_name: "account-123".to_string(),
            expected_version: 4,
            actual_version: Some(6),
        };
        assert!(err.to_string().contains("account-123"));
        assert!(err.to_string().contains("expected version 4"));
    }

    #[test]
    fn test_unhandled_message_type_display() {
        let err = Error::UnhandledMessageType {
            consumer: "billing".to_string(),
            message_type: "Withdrawn".to_string(),
        };
        assert_eq!(err.to_string(), "billing consumer: unhandled message type (Withdrawn)");
    }

    #[test]
    fn test_operation_error_keeps_source() {
        let err = Error::operation(
            "billing consumer",
            "error updating consumer position",
            Error::Pool("timed out".to_string()),
        );
        assert_eq!(err.to_string(), "billing consumer: error updating consumer position");
        assert_eq!(err.source().unwrap().to_string(), "Pool error: timed out");
    }

    #[test]
    fn test_from_serde_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Validation(_)));
    }
}
