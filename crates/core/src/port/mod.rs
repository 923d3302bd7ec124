// Port Layer - Interfaces for external dependencies

pub mod broker;
pub mod id_provider; // For deterministic testing
pub mod notifier;
pub mod object_store;
pub mod processor;
pub mod time_provider;

// Re-exports
pub use broker::{
    BrokerChannel, BrokerConnection, BrokerConnector, BrokerError, Delivery, DeliveryStream,
    DeliveryTag,
};
pub use id_provider::IdProvider;
pub use notifier::{Notifier, NotifyError};
pub use object_store::{ObjectStore, ObjectStoreError};
pub use processor::{JobProcessor, ProcessingError, ProcessorOutput};
pub use time_provider::TimeProvider;
