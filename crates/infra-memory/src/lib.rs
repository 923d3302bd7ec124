// Chorus Infrastructure - In-Process Adapters
// Implements: BrokerConnector/BrokerConnection/BrokerChannel, ObjectStore

mod broker;
mod store;

pub use broker::{MemoryBroker, MemoryConnector};
pub use store::MemoryObjectStore;
