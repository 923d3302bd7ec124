// Application Layer - Dispatch pipeline components

pub mod connection;
pub mod consumer;
pub mod feedback;
pub mod intake;
pub mod pipeline;
pub mod publisher;

// Re-exports
pub use connection::{ConnectionManager, ConnectionSettings};
pub use consumer::BatchConsumer;
pub use feedback::{stop_channel, FeedbackPoller, ResultDispatcher, StopHandle, StopSignal};
pub use intake::{IntakeService, SubmissionReceipt};
pub use pipeline::InferencePipeline;
pub use publisher::Publisher;
