// Central Error Type for the Application

use thiserror::Error;

use crate::domain::SchemaError;
use crate::port::broker::BrokerError;
use crate::port::notifier::NotifyError;
use crate::port::object_store::ObjectStoreError;
use crate::port::processor::ProcessingError;

/// Application-level error type
///
/// Propagation policy: transport errors are recovered locally up to
/// the retry budget and become fatal once exhausted; application
/// errors (bad payloads, processing failures) are isolated per
/// message and never crash a consuming loop.
#[derive(Error, Debug)]
pub enum AppError {
    /// Fatal: every connection attempt failed. The caller must not
    /// retry further without operator intervention.
    #[error("broker connection exhausted after {attempts} attempts: {reason}")]
    ConnectionExhausted { attempts: u32, reason: String },

    /// Recoverable: the caller decides whether to retry, drop, or
    /// escalate. The message may have been lost.
    #[error("publish to queue '{queue}' failed: {source}")]
    Publish {
        queue: String,
        #[source]
        source: BrokerError,
    },

    /// Data-quality issue: the offending message is dropped and acked
    /// so the broker does not redeliver it forever.
    #[error("message validation failed: {0}")]
    Validation(#[from] SchemaError),

    /// Per-message processing failure, isolated from the rest of the
    /// batch.
    #[error("processing failed for ticket '{ticket}': {source}")]
    Processing {
        ticket: String,
        #[source]
        source: ProcessingError,
    },

    /// Feedback handler failure: the message stays unacknowledged and
    /// the broker redelivers it after the session ends.
    #[error("feedback handler failed: {0}")]
    Handler(String),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("object storage error: {0}")]
    Storage(#[from] ObjectStoreError),

    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
