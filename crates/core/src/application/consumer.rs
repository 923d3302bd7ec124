// Batch Consumer - Worker-side batched consumption
// Subscribes in manual-acknowledgment mode, validates each delivery
// at the boundary, and accumulates jobs in memory until the batch
// threshold triggers sequential processing.
//
// Ack policy: a valid message is acknowledged when it enters the
// accumulator, before processing runs. A crash between ack and flush
// loses the accumulated batch.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use tracing::{error, info, warn};

use crate::domain::JobMessage;
use crate::error::Result;
use crate::port::broker::BrokerChannel;

/// Consumes a queue into fixed-size batches
pub struct BatchConsumer {
    channel: Arc<dyn BrokerChannel>,
    queue: String,
    batch_size: usize,
}

impl BatchConsumer {
    pub fn new(channel: Arc<dyn BrokerChannel>, queue: impl Into<String>, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be at least 1");
        Self {
            channel,
            queue: queue.into(),
            batch_size,
        }
    }

    /// Run until the channel closes (the consumer's terminal state)
    ///
    /// Schema failures are logged and acknowledged so the broker does
    /// not redeliver poison messages forever. A `process_fn` failure
    /// for one message never aborts the rest of its batch.
    pub async fn run<F, Fut>(&self, mut process_fn: F) -> Result<()>
    where
        F: FnMut(JobMessage) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        info!(queue = %self.queue, batch_size = %self.batch_size, "Batch consumer started");

        let mut deliveries = self.channel.subscribe(&self.queue).await?;
        let mut batch: Vec<JobMessage> = Vec::with_capacity(self.batch_size);

        while let Some(delivery) = deliveries.next().await {
            match JobMessage::from_bytes(&delivery.body) {
                Ok(job) => {
                    self.ack(delivery.tag).await;
                    batch.push(job);
                    if batch.len() >= self.batch_size {
                        self.flush(&mut batch, &mut process_fn).await;
                    }
                }
                Err(e) => {
                    // Poison message: dropped and acked, never batched
                    warn!(
                        queue = %self.queue,
                        tag = %delivery.tag,
                        redelivered = %delivery.redelivered,
                        error = %e,
                        "Dropping message that failed validation"
                    );
                    self.ack(delivery.tag).await;
                }
            }
        }

        if !batch.is_empty() {
            warn!(
                queue = %self.queue,
                pending = batch.len(),
                "Channel closed with a partial batch; messages were already acked"
            );
        }
        info!(queue = %self.queue, "Batch consumer stopped: channel closed");
        Ok(())
    }

    async fn flush<F, Fut>(&self, batch: &mut Vec<JobMessage>, process_fn: &mut F)
    where
        F: FnMut(JobMessage) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        info!(
            queue = %self.queue,
            in_flight = batch.len(),
            "Batch threshold reached, processing"
        );
        for job in batch.drain(..) {
            let ticket = job.ticket_number.clone();
            if let Err(e) = process_fn(job).await {
                // Isolated per message: the rest of the batch still runs
                error!(
                    queue = %self.queue,
                    ticket = %ticket,
                    error = %e,
                    "Processing failed for one message in batch"
                );
            }
        }
    }

    async fn ack(&self, tag: u64) {
        if let Err(e) = self.channel.ack(tag).await {
            error!(queue = %self.queue, tag = %tag, error = %e, "Failed to acknowledge delivery");
        }
    }
}
