//! Consumption engine for a Message DB style event store
//!
//! Reads an append-only, globally ordered log in bounded batches, hands every
//! message to registered handlers in order, and checkpoints progress.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use message_consumer::message_db::{Consumer, ConsumerConfig, MemoryStore, Writer};
//! use message_consumer::message_db::types::{Message, WriteMessage};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! let writer = Writer::new(store.clone());
//! writer
//!     .write_initial(vec![WriteMessage::new("Opened").with_data(json!({ "owner": "ada" }))], "account-1")
//!     .await
//!     .unwrap();
//!
//! let mut consumer = Consumer::new(store, ConsumerConfig::new("audit", "account")).unwrap();
//! consumer.on("Opened", |msg: Message| async move {
//!     println!("account opened by {}", msg.data["owner"]);
//!     Ok(())
//! });
//!
//! let handle = consumer.start().await.unwrap();
//! handle.stop();
//! handle.join().await.unwrap();
//! # });
//! ```

pub mod consumer;
pub mod error;
pub mod messaging;
pub mod store;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use consumer::{Consumer, ConsumerConfig, ConsumerHandle, ConsumerState};
pub use error::{Error, Result};
pub use messaging::Writer;
pub use store::{MemoryStore, MessageDbConfig, MessageStore, PostgresStore};
pub use types::{Message, WriteMessage};
