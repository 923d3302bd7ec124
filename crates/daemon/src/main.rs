//! Chorus Dispatch - Main Entry Point
//! Composition root: wires the broker, storage, processor and
//! notifier adapters into the batch consumer and feedback poller.

mod adapters;
mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chorus_core::application::{
    stop_channel, BatchConsumer, ConnectionManager, ConnectionSettings, FeedbackPoller,
    InferencePipeline, IntakeService, Publisher, ResultDispatcher,
};
use chorus_core::port::id_provider::UuidTicketProvider;
use chorus_core::port::object_store::ObjectStore;
use chorus_core::port::time_provider::SystemTimeProvider;
use chorus_infra_memory::{MemoryBroker, MemoryObjectStore};

use adapters::{HeuristicProcessor, LogNotifier};
use config::Config;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Grace period for the poller to drain its in-flight message
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let log_format = std::env::var("CHORUS_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("chorus=info"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            // Development: pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Chorus Dispatch v{} starting...", VERSION);

    // 2. Load configuration
    let config = Config::from_env();
    config.log_config();

    // 3. Broker connection (in-process broker for the demo deployment)
    let broker = MemoryBroker::new();
    let manager = Arc::new(ConnectionManager::new(
        Arc::new(broker.connector()),
        ConnectionSettings::new(config.broker_host.clone(), config.broker_port)
            .max_retries(config.max_retries)
            .retry_delay(config.retry_delay),
    ));

    let admin_channel = manager.open_channel().await?;
    admin_channel.declare_queue(&config.forwarding_queue).await?;
    admin_channel.declare_queue(&config.feedback_queue).await?;

    // 4. Storage and collaborator adapters
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
    store.ensure_bucket(&config.bucket).await?;

    let processor = Arc::new(HeuristicProcessor);
    let notifier = Arc::new(LogNotifier::new(Arc::clone(&store), config.bucket.clone()));

    // 5. Worker: batch consumer driving the inference pipeline.
    // Consumer and poller each own their channel; only the connection
    // itself is shared.
    let consumer_channel = manager.open_channel().await?;
    let results_channel = manager.open_channel().await?;
    let pipeline = Arc::new(InferencePipeline::new(
        Arc::clone(&store),
        processor,
        Publisher::new(results_channel, config.feedback_queue.clone()),
        config.bucket.clone(),
    ));
    let consumer = BatchConsumer::new(
        consumer_channel,
        config.forwarding_queue.clone(),
        config.batch_size,
    );

    let consumer_handle = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        async move {
            let result = consumer
                .run(move |job| {
                    let pipeline = Arc::clone(&pipeline);
                    async move { pipeline.process_job(job).await }
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "Batch consumer failed");
            }
        }
    });

    // 6. Feedback poller bridging results to the notifier
    let poller_channel = manager.open_channel().await?;
    let poller = FeedbackPoller::new(poller_channel, config.feedback_queue.clone());
    let dispatcher = ResultDispatcher::new(notifier);
    let (stop_handle, stop_signal) = stop_channel();

    let poller_handle = tokio::spawn(async move {
        let result = poller
            .run(|message| dispatcher.dispatch(message), stop_signal)
            .await;
        if let Err(e) = result {
            error!(error = %e, "Feedback poller failed");
        }
    });

    // 7. Optional development submission
    if let Some(email) = &config.demo_email {
        let intake_channel = manager.open_channel().await?;
        let intake = IntakeService::new(
            Arc::clone(&store),
            Publisher::new(intake_channel, config.forwarding_queue.clone()),
            Arc::new(UuidTicketProvider),
            Arc::new(SystemTimeProvider),
            config.bucket.clone(),
        );
        let receipt = intake
            .submit_upload(email, "Turdus_merula.wav", sample_recording())
            .await?;
        info!(ticket = %receipt.ticket_number, "Submitted development sample");
    }

    info!("System ready. Waiting for jobs...");
    info!("Press Ctrl+C to shutdown");

    // 8. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 9. Graceful shutdown: the poller drains its in-flight message;
    // the consumer has no cancellation point and is aborted with the
    // process. Unacked deliveries are redelivered next run.
    stop_handle.stop();
    let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, poller_handle).await;
    consumer_handle.abort();

    info!("Shutdown complete.");

    Ok(())
}

/// Byte pattern standing in for the bundled sample recording
fn sample_recording() -> Vec<u8> {
    let mut bytes = b"RIFF\x24\x08\x00\x00WAVEfmt ".to_vec();
    bytes.extend((0..1024u32).map(|i| (i % 251) as u8));
    bytes
}
