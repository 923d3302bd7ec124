//! Full pipeline scenario: intake -> forwarding queue -> batch
//! consumer -> inference -> feedback queue -> poller -> notifier.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chorus_core::application::{
    stop_channel, BatchConsumer, FeedbackPoller, InferencePipeline, IntakeService, Publisher,
    ResultDispatcher,
};
use chorus_core::domain::{JobMessage, ResultMessage};
use chorus_core::port::broker::{BrokerChannel, BrokerConnector};
use chorus_core::port::id_provider::IdProvider;
use chorus_core::port::notifier::mocks::RecordingNotifier;
use chorus_core::port::object_store::ObjectStore;
use chorus_core::port::processor::mocks::MockProcessor;
use chorus_core::port::time_provider::SystemTimeProvider;
use chorus_infra_memory::{MemoryBroker, MemoryObjectStore};

const FORWARDING: &str = "chorus.jobs";
const FEEDBACK: &str = "chorus.results";
const BUCKET: &str = "recordings";

/// Deterministic ticket for the scenario
struct FixedTicket;

impl IdProvider for FixedTicket {
    fn generate_ticket(&self) -> String {
        "ab12cd".to_string()
    }
}

async fn open_channel(broker: &MemoryBroker) -> Arc<dyn BrokerChannel> {
    let connection = broker.connector().connect("broker", 5672).await.unwrap();
    connection.open_channel().await.unwrap()
}

#[tokio::test]
async fn test_submission_flows_through_to_notification_with_score() {
    let broker = MemoryBroker::new();
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
    store.ensure_bucket(BUCKET).await.unwrap();

    let admin = open_channel(&broker).await;
    admin.declare_queue(FORWARDING).await.unwrap();
    admin.declare_queue(FEEDBACK).await.unwrap();

    // Worker side: batch_size = 1 processes each job immediately
    let processor = Arc::new(MockProcessor::new_success(Some(0.92)));
    let pipeline = Arc::new(InferencePipeline::new(
        Arc::clone(&store),
        Arc::clone(&processor) as Arc<_>,
        Publisher::new(open_channel(&broker).await, FEEDBACK),
        BUCKET,
    ));
    let consumer = BatchConsumer::new(open_channel(&broker).await, FORWARDING, 1);
    let consumer_task = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        async move {
            consumer
                .run(move |job| {
                    let pipeline = Arc::clone(&pipeline);
                    async move { pipeline.process_job(job).await }
                })
                .await
                .unwrap();
        }
    });

    // Notifier side: poller bridging feedback to the notifier, with
    // the raw result recorded for assertions
    let notifier = Arc::new(RecordingNotifier::new());
    let dispatcher = Arc::new(ResultDispatcher::new(Arc::clone(&notifier) as Arc<_>));
    let results: Arc<Mutex<Vec<ResultMessage>>> = Arc::new(Mutex::new(Vec::new()));
    let (stop_handle, stop_signal) = stop_channel();
    let poller = FeedbackPoller::new(open_channel(&broker).await, FEEDBACK)
        .poll_interval(Duration::from_millis(5));
    let poller_task = tokio::spawn({
        let results = Arc::clone(&results);
        async move {
            poller
                .run(
                    move |message| {
                        results.lock().unwrap().push(message.clone());
                        let dispatcher = Arc::clone(&dispatcher);
                        async move { dispatcher.dispatch(message).await }
                    },
                    stop_signal,
                )
                .await
                .unwrap();
        }
    });

    // Intake side
    let intake = IntakeService::new(
        Arc::clone(&store),
        Publisher::new(open_channel(&broker).await, FORWARDING),
        Arc::new(FixedTicket),
        Arc::new(SystemTimeProvider),
        BUCKET,
    );
    let receipt = intake
        .submit_upload("x@y.com", "a.wav", b"RIFF...".to_vec())
        .await
        .unwrap();
    assert_eq!(receipt.ticket_number, "ab12cd");

    // Wait for the notification to land
    let sent = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let sent = notifier.sent();
            if !sent.is_empty() {
                break sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("notification must arrive");

    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "x@y.com");
    assert_eq!(sent[0].ticket_number, "ab12cd");

    // The feedback record carries the job fields and the score
    let results = results.lock().unwrap().clone();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].job.ticket_number, "ab12cd");
    assert_eq!(results[0].classification_score, Some(0.92));
    assert_eq!(processor.call_count(), 1);

    // Both artifacts were persisted under the reserved keys
    let job: &JobMessage = &results[0].job;
    assert!(store.fetch(BUCKET, &job.result_artifact_path).await.is_ok());
    assert!(store
        .fetch(BUCKET, &job.auxiliary_artifact_path)
        .await
        .is_ok());

    // Cooperative shutdown
    stop_handle.stop();
    tokio::time::timeout(Duration::from_secs(1), poller_task)
        .await
        .unwrap()
        .unwrap();
    broker.drop_connections();
    tokio::time::timeout(Duration::from_secs(1), consumer_task)
        .await
        .unwrap()
        .unwrap();
}
