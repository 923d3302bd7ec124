// Publisher - Producer-side publishing
// Serializes a record to the JSON wire encoding and issues a
// fire-and-forget publish with no delivery confirmation. No internal
// retry: the caller decides whether to retry, drop, or escalate, and
// message loss on publish failure is a documented operational risk.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};

use crate::error::{AppError, Result};
use crate::port::broker::BrokerChannel;

/// Publishes records to one named queue over an owned channel
pub struct Publisher {
    channel: Arc<dyn BrokerChannel>,
    queue: String,
}

impl Publisher {
    pub fn new(channel: Arc<dyn BrokerChannel>, queue: impl Into<String>) -> Self {
        Self {
            channel,
            queue: queue.into(),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Publish one record, never blocking on the consumer
    pub async fn publish<T: Serialize>(&self, record: &T) -> Result<()> {
        let body = serde_json::to_vec(record)?;
        debug!(queue = %self.queue, bytes = body.len(), "Publishing message");

        match self.channel.publish(&self.queue, body).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(queue = %self.queue, error = %e, "Failed to publish message");
                Err(AppError::Publish {
                    queue: self.queue.clone(),
                    source: e,
                })
            }
        }
    }
}
