//! Consumer module: reads a stream in batches and dispatches every message
//!
//! This module provides:
//! - `Consumer`: batch fetching, backpressure, dispatch and checkpointing
//! - `ConsumerConfig`: configuration for consumers
//! - `Scheduler`: the single-flight task queue every consumer runs on
//! - `HandlerRegistry`: routes messages to handlers by type
//! - `PositionTracker`: coalesced checkpoint writes
//!
//! # Flow control
//!
//! A consumer is always in one of three states:
//!
//! 1. **filling**: a fetch is in flight or about to be issued
//! 2. **draining**: the queue reached the high water mark; no fetches until
//!    it drains below the low water mark
//! 3. **waitForMessages**: nothing queued for processing; the next batch
//!    restarts dispatch
//!
//! All consumer work is a task on one [`Scheduler`], so at most one task
//! touches the queue, cursor and state at any time.
//!
//! # Failures
//!
//! A handler error, an unhandled type in strict mode, or a failed checkpoint
//! write pauses the consumer. The failed message stays at the head of the
//! queue and is retried first after [`ConsumerHandle::resume`]. No message is
//! skipped and no checkpoint covers a message that was not handled.
//!
//! # Position Tracking
//!
//! - Position stream: `{category}:position-{consumer_name}`
//! - Written every `position_update_interval` messages
//! - Flushed when the consumer stops
//! - Up to `position_update_interval - 1` messages are redelivered after a crash
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use message_consumer::message_db::consumer::{Consumer, ConsumerConfig};
//! use message_consumer::message_db::store::MemoryStore;
//! use message_consumer::message_db::types::Message;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! let config = ConsumerConfig::new("billing", "account")
//!     .with_water_marks(100, 10)
//!     .with_position_update_interval(20);
//!
//! let mut consumer = Consumer::new(store, config).unwrap();
//! consumer.on("Withdrawn", |msg: Message| async move {
//!     println!("Processing withdrawal: amount={}", msg.data["amount"]);
//!     Ok(())
//! });
//!
//! let handle = consumer.start().await.unwrap();
//! handle.stop();
//! handle.join().await.unwrap();
//! # });
//! ```

pub mod consumer;
pub mod position;
pub mod registry;
pub mod scheduler;

pub use consumer::{Consumer, ConsumerConfig, ConsumerHandle, ConsumerState, ConsumerStatus};
pub use position::{PositionStore, PositionTracker, StorePositions};
pub use registry::{Handler, HandlerRegistry};
pub use scheduler::Scheduler;
