// Inference Pipeline - Worker-side processing of one job
// Fetches the source artifact, runs the processor, persists the
// result and auxiliary artifacts, and publishes the feedback record.
// Invoked per message by the Batch Consumer, which isolates failures.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::publisher::Publisher;
use crate::domain::{JobMessage, ResultMessage};
use crate::error::{AppError, Result};
use crate::port::{JobProcessor, ObjectStore, ProcessingError};

/// Runs inference for one job and reports the result
pub struct InferencePipeline {
    store: Arc<dyn ObjectStore>,
    processor: Arc<dyn JobProcessor>,
    results: Publisher,
    bucket: String,
}

impl InferencePipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        processor: Arc<dyn JobProcessor>,
        results: Publisher,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            store,
            processor,
            results,
            bucket: bucket.into(),
        }
    }

    /// Process one job end to end
    pub async fn process_job(&self, job: JobMessage) -> Result<()> {
        let ticket = job.ticket_number.clone();
        info!(
            ticket = %ticket,
            source = %job.source_object_path,
            "Running inference pipeline"
        );

        let source = self
            .store
            .fetch(&self.bucket, &job.source_object_path)
            .await
            .map_err(|e| processing(&ticket, ProcessingError::SourceUnavailable(e.to_string())))?;

        let output = self
            .processor
            .process(&source)
            .await
            .map_err(|e| processing(&ticket, e))?;

        if output.result_artifact.is_empty() {
            warn!(ticket = %ticket, "Classification produced no annotations");
        }

        self.store
            .write(&self.bucket, &job.result_artifact_path, output.result_artifact)
            .await
            .map_err(|e| processing(&ticket, ProcessingError::Persist(e.to_string())))?;

        if let Some(auxiliary) = output.auxiliary_artifact {
            self.store
                .write(&self.bucket, &job.auxiliary_artifact_path, auxiliary)
                .await
                .map_err(|e| processing(&ticket, ProcessingError::Persist(e.to_string())))?;
        }

        let result = ResultMessage::for_completed(job, output.score);
        info!(
            ticket = %ticket,
            score = ?result.classification_score,
            "Publishing feedback record"
        );
        self.results.publish(&result).await
    }
}

fn processing(ticket: &str, source: ProcessingError) -> AppError {
    AppError::Processing {
        ticket: ticket.to_string(),
        source,
    }
}
