use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use message_consumer::message_db::consumer::{Consumer, ConsumerConfig, PositionStore, StorePositions};
use message_consumer::message_db::types::{Message, WriteMessage};
use message_consumer::message_db::{Error, MemoryStore, Writer};
use serde_json::json;

/// Example: in-memory consumer with backpressure and pause-on-failure
///
/// Writes a few withdrawals and deposits, consumes the `account` category with
/// small water marks, makes one handler fail once and resumes after it.
///
/// To run this example:
///     RUST_LOG=debug cargo run --example consumer_demo
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== Consumer Demo ===\n");

    let store = Arc::new(MemoryStore::new().with_batch_size(4));
    let writer = Writer::new(store.clone());

    for i in 0..5 {
        writer
            .write(
                vec![WriteMessage::new("Withdrawn")
                    .with_data(json!({ "amount": 10 * (i + 1), "currency": "USD" }))
                    .with_metadata(json!({ "correlation_id": format!("corr-{}", i) }))],
                &format!("account-{}", i),
                None,
            )
            .await?;
    }
    for i in 0..3 {
        writer
            .write(
                vec![WriteMessage::new("Deposited")
                    .with_data(json!({ "amount": 20 * (i + 1), "currency": "USD" }))],
                &format!("account-{}", i),
                None,
            )
            .await?;
    }
    println!("Wrote 8 test messages\n");

    let config = ConsumerConfig::new("demo", "account")
        .with_water_marks(6, 2)
        .with_position_update_interval(3)
        .with_polling_interval_ms(50);
    let mut consumer = Consumer::new(store.clone(), config)?;

    consumer.on("Withdrawn", |msg: Message| async move {
        println!(
            "[Withdrawn] Stream: {}, Amount: ${}, Position: {}, Correlation: {:?}",
            msg.stream_name,
            msg.data["amount"],
            msg.global_position,
            msg.correlation_id()
        );
        Ok(())
    });

    let attempts = Arc::new(AtomicUsize::new(0));
    {
        let attempts = attempts.clone();
        consumer.on("Deposited", move |msg: Message| {
            let attempts = attempts.clone();
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(Error::handler("bank ledger offline"));
                }
                println!(
                    "[Deposited] Stream: {}, Amount: ${}, Position: {}",
                    msg.stream_name, msg.data["amount"], msg.global_position
                );
                Ok(())
            }
        });
    }

    let handle = consumer.start().await?;

    while !handle.is_paused() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let status = handle.status();
    println!(
        "\nPaused in state {} with {} queued, {} dispatched; resuming\n",
        status.state, status.queue_len, status.dispatched
    );
    handle.resume();

    while handle.status().dispatched < 8 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    handle.stop();
    handle.join().await?;

    let checkpoint = StorePositions::new(store, "demo").get("account").await?;
    println!("\nFinal position saved: {:?}", checkpoint);
    println!("\n=== Demo Complete ===");
    Ok(())
}
