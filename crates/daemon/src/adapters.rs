//! Stand-in collaborator adapters for the demo deployment
//!
//! The inference model and the SMTP relay are external collaborators;
//! these adapters implement their ports well enough to run the full
//! pipeline end to end without either service.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use chorus_core::port::notifier::{Notifier, NotifyError};
use chorus_core::port::object_store::ObjectStore;
use chorus_core::port::processor::{JobProcessor, ProcessingError, ProcessorOutput};

/// Scores a recording by byte-energy and emits one annotation line.
/// A real deployment replaces this with the model-serving adapter.
pub struct HeuristicProcessor;

#[async_trait]
impl JobProcessor for HeuristicProcessor {
    async fn process(&self, source: &[u8]) -> Result<ProcessorOutput, ProcessingError> {
        if source.is_empty() {
            return Err(ProcessingError::Inference("empty recording".to_string()));
        }
        let energy: u64 = source.iter().map(|b| *b as u64).sum();
        let score = (energy % 1000) as f64 / 1000.0;
        let annotation = format!("0.0\t1.0\tunclassified\t{score:.3}\n");
        Ok(ProcessorOutput {
            result_artifact: annotation.into_bytes(),
            auxiliary_artifact: None,
            score: Some(score),
        })
    }
}

/// Fetches the result artifact and logs the delivery instead of
/// speaking SMTP
pub struct LogNotifier {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl LogNotifier {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        recipient: &str,
        artifact_path: &str,
        ticket_number: &str,
    ) -> Result<(), NotifyError> {
        let attachment = self
            .store
            .fetch(&self.bucket, artifact_path)
            .await
            .map_err(|e| {
                error!(ticket = %ticket_number, error = %e, "Result artifact missing, notification not sent");
                NotifyError::AttachmentUnavailable(artifact_path.to_string())
            })?;

        info!(
            recipient = %recipient,
            ticket = %ticket_number,
            attachment = %artifact_path,
            attachment_bytes = attachment.len(),
            "Classification results delivered"
        );
        Ok(())
    }
}
