// Job Processor Port (Interface)
// Abstraction for the inference model: consumes one source artifact,
// produces one result artifact, an optional auxiliary artifact and an
// optional classification score.

use async_trait::async_trait;
use thiserror::Error;

/// Output of one inference run
#[derive(Debug, Clone)]
pub struct ProcessorOutput {
    /// Primary output (annotation lines)
    pub result_artifact: Vec<u8>,
    /// Secondary output (serialized spectrogram), absent when the
    /// model was asked not to produce one
    pub auxiliary_artifact: Option<Vec<u8>>,
    /// May be absent when no usable detection was made
    pub score: Option<f64>,
}

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("source artifact unavailable: {0}")]
    SourceUnavailable(String),

    #[error("model inference failed: {0}")]
    Inference(String),

    #[error("result artifact could not be persisted: {0}")]
    Persist(String),
}

#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// Run inference over the artifact contents of one job
    async fn process(&self, source: &[u8]) -> Result<ProcessorOutput, ProcessingError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Mock processor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Succeed with a fixed score
        Success(Option<f64>),
        /// Fail with message
        Fail(String),
    }

    /// Mock Job Processor for testing
    pub struct MockProcessor {
        behavior: MockBehavior,
        call_count: Mutex<usize>,
    }

    impl MockProcessor {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior,
                call_count: Mutex::new(0),
            }
        }

        pub fn new_success(score: Option<f64>) -> Self {
            Self::new(MockBehavior::Success(score))
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }

        pub fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl JobProcessor for MockProcessor {
        async fn process(&self, source: &[u8]) -> Result<ProcessorOutput, ProcessingError> {
            *self.call_count.lock().unwrap() += 1;

            match &self.behavior {
                MockBehavior::Success(score) => Ok(ProcessorOutput {
                    result_artifact: format!("annotations for {} bytes", source.len()).into_bytes(),
                    auxiliary_artifact: Some(b"spectrogram".to_vec()),
                    score: *score,
                }),
                MockBehavior::Fail(msg) => Err(ProcessingError::Inference(msg.clone())),
            }
        }
    }
}
