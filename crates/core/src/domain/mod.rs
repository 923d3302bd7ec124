// Domain Layer - Message schemas and artifact naming

pub mod artifact;
pub mod message;

// Re-exports
pub use artifact::ArtifactKeys;
pub use message::{JobMessage, ResultMessage, SchemaError, TicketNumber};
