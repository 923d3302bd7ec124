// Intake Service - Submission side of the pipeline
// Reserves a ticket and artifact keys for an upload, persists the
// source artifact, and publishes the job record to the forwarding
// queue.

use std::sync::Arc;

use tracing::info;

use crate::application::publisher::Publisher;
use crate::domain::{ArtifactKeys, JobMessage};
use crate::error::Result;
use crate::port::{IdProvider, ObjectStore, TimeProvider};

/// What intake hands back to the caller after a submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub ticket_number: String,
    pub email: String,
    pub source_object_path: String,
}

/// Accepts classification submissions
pub struct IntakeService {
    store: Arc<dyn ObjectStore>,
    jobs: Publisher,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    bucket: String,
}

impl IntakeService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        jobs: Publisher,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            store,
            jobs,
            id_provider,
            time_provider,
            bucket: bucket.into(),
        }
    }

    /// Accept one uploaded recording
    ///
    /// Writes the source artifact before publishing, so a consumer can
    /// never observe a job whose source does not exist yet.
    pub async fn submit_upload(
        &self,
        email: &str,
        original_filename: &str,
        contents: Vec<u8>,
    ) -> Result<SubmissionReceipt> {
        let ticket_number = self.id_provider.generate_ticket();
        let keys = ArtifactKeys::derive(original_filename, self.time_provider.now());

        let job = JobMessage {
            ticket_number,
            email: email.to_string(),
            source_object_path: keys.source,
            result_artifact_path: keys.result,
            auxiliary_artifact_path: keys.auxiliary,
        };
        job.validate()?;

        self.store
            .write(&self.bucket, &job.source_object_path, contents)
            .await?;
        self.submit(job.clone()).await?;

        Ok(SubmissionReceipt {
            ticket_number: job.ticket_number,
            email: job.email,
            source_object_path: job.source_object_path,
        })
    }

    /// Publish a pre-built job record to the forwarding queue
    pub async fn submit(&self, job: JobMessage) -> Result<()> {
        job.validate()?;
        info!(
            ticket = %job.ticket_number,
            source = %job.source_object_path,
            "Submitting job"
        );
        self.jobs.publish(&job).await
    }
}
