//! Queue-level properties of the dispatch pipeline against a live
//! in-process broker: wire round-trips, batch thresholds, poison
//! handling and redelivery.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chorus_core::application::{BatchConsumer, Publisher};
use chorus_core::domain::{JobMessage, ResultMessage};
use chorus_core::port::broker::{BrokerChannel, BrokerConnector};
use chorus_infra_memory::MemoryBroker;

fn job(ticket: &str) -> JobMessage {
    JobMessage {
        ticket_number: ticket.to_string(),
        email: "x@y.com".to_string(),
        source_object_path: "audio/a.wav".to_string(),
        result_artifact_path: "annotations/a_annot.txt".to_string(),
        auxiliary_artifact_path: "spectrograms/a_spectro.pt".to_string(),
    }
}

async fn open_channel(broker: &MemoryBroker) -> Arc<dyn BrokerChannel> {
    let connection = broker.connector().connect("broker", 5672).await.unwrap();
    connection.open_channel().await.unwrap()
}

#[tokio::test]
async fn test_publish_fetch_roundtrip_preserves_message() {
    let broker = MemoryBroker::new();
    let channel = open_channel(&broker).await;
    channel.declare_queue("forwarding").await.unwrap();

    let original = job("ab12cd");
    Publisher::new(Arc::clone(&channel), "forwarding")
        .publish(&original)
        .await
        .unwrap();

    let delivery = channel.fetch_one("forwarding").await.unwrap().unwrap();

    // Wire encoding: one JSON object with every declared field at the
    // top level
    let wire: serde_json::Value = serde_json::from_slice(&delivery.body).unwrap();
    assert_eq!(wire["ticket_number"], "ab12cd");
    assert_eq!(wire["email"], "x@y.com");
    assert_eq!(wire["source_object_path"], "audio/a.wav");

    let parsed = JobMessage::from_bytes(&delivery.body).unwrap();
    assert_eq!(parsed, original);
}

#[tokio::test]
async fn test_result_roundtrip_preserves_score() {
    let broker = MemoryBroker::new();
    let channel = open_channel(&broker).await;

    let original = ResultMessage::for_completed(job("ab12cd"), Some(0.92));
    Publisher::new(Arc::clone(&channel), "feedback")
        .publish(&original)
        .await
        .unwrap();

    let delivery = channel.fetch_one("feedback").await.unwrap().unwrap();
    let parsed = ResultMessage::from_bytes(&delivery.body).unwrap();
    assert_eq!(parsed, original);
}

#[tokio::test]
async fn test_batch_of_n_processes_exactly_n_after_nth_message() {
    let broker = MemoryBroker::new();
    let producer = open_channel(&broker).await;
    let publisher = Publisher::new(producer, "forwarding");

    let consumer_channel = open_channel(&broker).await;
    let consumer = BatchConsumer::new(Arc::clone(&consumer_channel), "forwarding", 3);

    let processed: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&processed);
    let consumer_task = tokio::spawn(async move {
        consumer
            .run(move |job| {
                seen.lock().unwrap().push(job.ticket_number);
                async { Ok(()) }
            })
            .await
            .unwrap();
    });

    // batch_size - 1 messages: nothing may be processed
    publisher.publish(&job("t1")).await.unwrap();
    publisher.publish(&job("t2")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(processed.lock().unwrap().is_empty());

    // the Nth message triggers exactly one invocation per message
    publisher.publish(&job("t3")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*processed.lock().unwrap(), vec!["t1", "t2", "t3"]);

    // channel close is the consumer's terminal state
    broker.drop_connections();
    tokio::time::timeout(Duration::from_secs(1), consumer_task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_poison_message_is_dropped_and_not_redelivered() {
    let broker = MemoryBroker::new();
    let producer = open_channel(&broker).await;
    producer
        .publish("forwarding", b"{\"broken\": true}".to_vec())
        .await
        .unwrap();

    let consumer_channel = open_channel(&broker).await;
    let consumer = BatchConsumer::new(consumer_channel, "forwarding", 1);
    let calls = Arc::new(Mutex::new(0u32));
    let seen = Arc::clone(&calls);
    let consumer_task = tokio::spawn(async move {
        consumer
            .run(move |_job| {
                *seen.lock().unwrap() += 1;
                async { Ok(()) }
            })
            .await
            .unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    broker.drop_connections();
    tokio::time::timeout(Duration::from_secs(1), consumer_task)
        .await
        .unwrap()
        .unwrap();

    // Acked on drop: the poison message must not survive the session
    assert_eq!(*calls.lock().unwrap(), 0);
    assert_eq!(broker.queue_depth("forwarding"), 0);
}

#[tokio::test]
async fn test_unacked_delivery_survives_session_loss() {
    let broker = MemoryBroker::new();
    let channel = open_channel(&broker).await;
    Publisher::new(Arc::clone(&channel), "feedback")
        .publish(&job("ab12cd"))
        .await
        .unwrap();

    // Fetch without acking, then lose the session
    let first = channel.fetch_one("feedback").await.unwrap().unwrap();
    assert!(!first.redelivered);
    broker.drop_connections();

    let channel = open_channel(&broker).await;
    let second = channel.fetch_one("feedback").await.unwrap().unwrap();
    assert!(second.redelivered);
    assert_eq!(second.body, first.body);
}
