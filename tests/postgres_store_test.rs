//! Message DB integration tests. They need Docker and are ignored by default:
//! `cargo test -- --ignored`
mod common;

use std::sync::{Arc, Mutex};

use message_consumer::message_db::consumer::{Consumer, ConsumerConfig, PositionStore, StorePositions};
use message_consumer::message_db::store::{MessageDbConfig, MessageStore, PostgresStore};
use message_consumer::message_db::types::{Message, WriteMessage};
use message_consumer::message_db::{Error, Writer};
use serde_json::json;
use testcontainers::clients::Cli;
use uuid::Uuid;

async fn connect(host_port: u16) -> PostgresStore {
    let conn_str = common::build_connection_string("127.0.0.1", host_port);
    let config = MessageDbConfig::from_connection_string(&conn_str)
        .expect("Failed to create config from connection string");

    PostgresStore::connect(config)
        .await
        .expect("Failed to connect to Message DB")
}

fn unique_category() -> String {
    format!("test{}", Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore]
async fn test_write_and_read_stream() {
    let docker = Cli::default();
    let container = docker.run(common::create_message_db_container());
    let store = connect(container.get_host_port_ipv4(common::POSTGRES_PORT)).await;

    let stream_name = format!("{}-{}", unique_category(), Uuid::new_v4());
    let position = store
        .write(
            vec![
                WriteMessage::new("Opened").with_data(json!({ "owner": "ada" })),
                WriteMessage::new("Deposited").with_data(json!({ "amount": 10 })),
            ],
            &stream_name,
            Some(-1),
        )
        .await
        .unwrap();
    assert_eq!(position, 1);

    let messages = store.get(&stream_name, 0).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].message_type, "Opened");
    assert_eq!(messages[0].position, 0);
    assert_eq!(messages[1].data["amount"], 10);
    assert!(messages[0].global_position < messages[1].global_position);

    let last = store.get_last(&stream_name).await.unwrap().unwrap();
    assert_eq!(last.message_type, "Deposited");
}

#[tokio::test]
#[ignore]
async fn test_expected_version_conflict() {
    let docker = Cli::default();
    let container = docker.run(common::create_message_db_container());
    let store = connect(container.get_host_port_ipv4(common::POSTGRES_PORT)).await;

    let stream_name = format!("{}-{}", unique_category(), Uuid::new_v4());
    store
        .write(vec![WriteMessage::new("Opened")], &stream_name, Some(-1))
        .await
        .unwrap();

    let err = store
        .write(vec![WriteMessage::new("Opened")], &stream_name, Some(-1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Concurrency { .. }));
}

#[tokio::test]
#[ignore]
async fn test_category_read_and_position_stream() {
    let docker = Cli::default();
    let container = docker.run(common::create_message_db_container());
    let store = Arc::new(connect(container.get_host_port_ipv4(common::POSTGRES_PORT)).await);

    let category = unique_category();
    let writer = Writer::new(store.clone());
    for owner in ["ada", "grace"] {
        writer
            .write_initial(
                vec![WriteMessage::new("Opened").with_data(json!({ "owner": owner }))],
                &format!("{}-{}", category, Uuid::new_v4()),
            )
            .await
            .unwrap();
    }

    let messages = store.get(&category, 0).await.unwrap();
    assert_eq!(messages.len(), 2);

    let positions = StorePositions::new(store.clone(), "audit");
    assert_eq!(positions.get(&category).await.unwrap(), None);
    positions.put(&category, messages[1].global_position).await.unwrap();
    assert_eq!(
        positions.get(&category).await.unwrap(),
        Some(messages[1].global_position)
    );
}

#[tokio::test]
#[ignore]
async fn test_consumer_reads_category() {
    let docker = Cli::default();
    let container = docker.run(common::create_message_db_container());
    let store = Arc::new(connect(container.get_host_port_ipv4(common::POSTGRES_PORT)).await);

    let category = unique_category();
    for amount in [10, 20, 30] {
        store
            .write(
                vec![WriteMessage::new("Deposited").with_data(json!({ "amount": amount }))],
                &format!("{}-{}", category, Uuid::new_v4()),
                None,
            )
            .await
            .unwrap();
    }

    let amounts = Arc::new(Mutex::new(Vec::new()));
    let config = ConsumerConfig::new("audit", category.clone())
        .with_polling_interval_ms(20)
        .with_position_update_interval(1);
    let mut consumer = Consumer::new(store.clone(), config).unwrap();
    {
        let amounts = amounts.clone();
        consumer.on("Deposited", move |msg: Message| {
            let amounts = amounts.clone();
            async move {
                amounts.lock().unwrap().push(msg.data["amount"].as_i64().unwrap_or(0));
                Ok(())
            }
        });
    }

    let handle = consumer.start().await.unwrap();
    common::wait_until("three dispatches", || handle.status().dispatched == 3).await;
    handle.stop();
    handle.join().await.unwrap();

    assert_eq!(*amounts.lock().unwrap(), vec![10, 20, 30]);
    let checkpoint = StorePositions::new(store.clone(), "audit")
        .get(&category)
        .await
        .unwrap();
    assert!(checkpoint.is_some());
}
