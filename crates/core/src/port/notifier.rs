// Notifier Port (Interface)
// Outbound notification delivery (email in the reference deployment).
// The adapter owns fetching the artifact it attaches; the core only
// hands over the storage key.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("attachment '{0}' could not be fetched")]
    AttachmentUnavailable(String),

    #[error("delivery to '{recipient}' failed: {reason}")]
    DeliveryFailed { recipient: String, reason: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver the result for one ticket to its recipient
    async fn notify(
        &self,
        recipient: &str,
        artifact_path: &str,
        ticket_number: &str,
    ) -> Result<(), NotifyError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// One recorded notification
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentNotification {
        pub recipient: String,
        pub artifact_path: String,
        pub ticket_number: String,
    }

    /// Notifier that records deliveries instead of sending them
    #[derive(Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<SentNotification>>,
        fail_with: Option<String>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn new_failing(reason: impl Into<String>) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_with: Some(reason.into()),
            }
        }

        pub fn sent(&self) -> Vec<SentNotification> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(
            &self,
            recipient: &str,
            artifact_path: &str,
            ticket_number: &str,
        ) -> Result<(), NotifyError> {
            if let Some(reason) = &self.fail_with {
                return Err(NotifyError::DeliveryFailed {
                    recipient: recipient.to_string(),
                    reason: reason.clone(),
                });
            }
            self.sent.lock().unwrap().push(SentNotification {
                recipient: recipient.to_string(),
                artifact_path: artifact_path.to_string(),
                ticket_number: ticket_number.to_string(),
            });
            Ok(())
        }
    }
}
