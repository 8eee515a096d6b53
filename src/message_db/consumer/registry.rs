use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::message_db::{
    error::{Error, Result},
    types::Message,
};

/// Something that reacts to a message.
///
/// Closures of the form `Fn(Message) -> impl Future<Output = Result<()>>`
/// implement this trait, so most handlers never need a named type.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, message: &Message) -> Result<()>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, message: &Message) -> Result<()> {
        (self)(message.clone()).await
    }
}

/// Routes messages to the handlers registered for their type
///
/// Handlers for one type run in registration order. In strict mode a message
/// whose type has no handlers is an error; otherwise it is ignored.
pub struct HandlerRegistry {
    name: String,
    strict: bool,
    handlers: HashMap<String, Vec<Arc<dyn Handler>>>,
}

impl HandlerRegistry {
    /// Create an empty registry; `name` labels errors and log lines
    pub fn new(name: impl Into<String>, strict: bool) -> Self {
        Self {
            name: name.into(),
            strict,
            handlers: HashMap::new(),
        }
    }

    /// Append a handler to the chain for `message_type`
    pub fn register<H>(&mut self, message_type: impl Into<String>, handler: H)
    where
        H: Handler + 'static,
    {
        self.handlers
            .entry(message_type.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Register a closure handler
    ///
    /// ```
    /// use message_consumer::message_db::consumer::HandlerRegistry;
    /// use message_consumer::message_db::types::Message;
    ///
    /// let mut registry = HandlerRegistry::new("billing", true);
    /// registry.on("Withdrawn", |msg: Message| async move {
    ///     println!("amount: {}", msg.data["amount"]);
    ///     Ok(())
    /// });
    /// assert!(registry.handles("Withdrawn"));
    /// ```
    pub fn on<F, Fut>(&mut self, message_type: impl Into<String>, handler: F)
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.register(message_type, handler);
    }

    /// True if at least one handler is registered for the type
    pub fn handles(&self, message_type: &str) -> bool {
        self.handlers
            .get(message_type)
            .map(|chain| !chain.is_empty())
            .unwrap_or(false)
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Run every handler registered for the message's type, in order.
    ///
    /// The first handler error stops the chain and is returned as is.
    pub async fn handle(&self, message: &Message) -> Result<()> {
        let chain = match self.handlers.get(&message.message_type) {
            Some(chain) if !chain.is_empty() => chain,
            _ if self.strict => {
                return Err(Error::UnhandledMessageType {
                    consumer: self.name.clone(),
                    message_type: message.message_type.clone(),
                });
            }
            _ => {
                debug!(
                    message_type = %message.message_type,
                    global_position = message.global_position,
                    "{} consumer: no handlers registered",
                    self.name
                );
                return Ok(());
            }
        };

        for handler in chain {
            handler.handle(message).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Mutex;
    use uuid::Uuid;

    fn message(message_type: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            stream_name: "account-1".to_string(),
            message_type: message_type.to_string(),
            data: json!({}),
            metadata: None,
            position: 0,
            global_position: 0,
            time: Utc::now(),
        }
    }

    struct Recorder {
        label: &'static str,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Handler for Recorder {
        async fn handle(&self, _message: &Message) -> Result<()> {
            self.calls.lock().unwrap().push(self.label);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_handlers_run_in_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new("test", false);
        for label in ["first", "second", "third"] {
            registry.register(
                "Opened",
                Recorder {
                    label,
                    calls: calls.clone(),
                },
            );
        }

        registry.handle(&message("Opened")).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_first_error_stops_chain() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new("test", false);
        registry.on("Opened", |_msg: Message| async move {
            Err(Error::handler("boom"))
        });
        registry.register(
            "Opened",
            Recorder {
                label: "after",
                calls: calls.clone(),
            },
        );

        let err = registry.handle(&message("Opened")).await.unwrap_err();

        assert!(matches!(err, Error::Handler(ref msg) if msg == "boom"));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_type_is_ignored_when_not_strict() {
        let registry = HandlerRegistry::new("test", false);
        assert!(registry.handle(&message("Unknown")).await.is_ok());
    }

    #[tokio::test]
    async fn test_unregistered_type_fails_when_strict() {
        let mut registry = HandlerRegistry::new("billing", true);
        registry.on("Opened", |_msg: Message| async move { Ok(()) });

        let err = registry.handle(&message("Closed")).await.unwrap_err();

        match err {
            Error::UnhandledMessageType {
                consumer,
                message_type,
            } => {
                assert_eq!(consumer, "billing");
                assert_eq!(message_type, "Closed");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(registry.handle(&message("Opened")).await.is_ok());
    }
}
