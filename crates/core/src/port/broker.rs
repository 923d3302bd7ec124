// Broker Port (Interface)
// Abstraction over the message broker: connections, channels,
// deliveries and acknowledgments. Adapters implement these traits;
// the core never talks to a broker client directly.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use thiserror::Error;

/// Broker-assigned handle identifying one unacknowledged delivery.
/// Exactly one ack per tag; acknowledging an unknown or already-acked
/// tag is a protocol error surfaced by the adapter.
pub type DeliveryTag = u64;

/// One message handed to a consumer, pending acknowledgment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tag: DeliveryTag,
    pub body: Vec<u8>,
    /// True when the broker re-sent this message after a previous
    /// session ended without acking it. Redelivered messages may
    /// arrive out of order.
    pub redelivered: bool,
}

/// Push-based subscription: yields deliveries until the channel closes
pub type DeliveryStream = BoxStream<'static, Delivery>;

/// Transport-level broker errors
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("connection refused by {host}:{port}: {reason}")]
    ConnectionRefused {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("connection is closed")]
    ConnectionClosed,

    #[error("channel is closed")]
    ChannelClosed,

    #[error("queue '{0}' does not exist")]
    UnknownQueue(String),

    #[error("unknown or already-acknowledged delivery tag {0}")]
    UnknownDeliveryTag(DeliveryTag),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Establishes broker connections. The Connection Manager owns retry
/// and caching on top of this; implementations only attempt once.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(&self, host: &str, port: u16)
        -> Result<Arc<dyn BrokerConnection>, BrokerError>;
}

/// Process-wide connection handle, open until the broker drops it
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// False once the broker side has dropped the connection
    fn is_open(&self) -> bool;

    /// Open a logical channel for publish/consume operations.
    /// Channels are single-owner: not safe for concurrent use from
    /// multiple tasks without external locking.
    async fn open_channel(&self) -> Result<Arc<dyn BrokerChannel>, BrokerError>;
}

impl std::fmt::Debug for dyn BrokerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BrokerConnection")
    }
}

/// Logical conduit over a connection
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Declare a queue, creating it if missing (idempotent)
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError>;

    /// Fire-and-forget publish with no delivery confirmation
    async fn publish(&self, queue: &str, body: Vec<u8>) -> Result<(), BrokerError>;

    /// Non-blocking fetch of at most one message
    async fn fetch_one(&self, queue: &str) -> Result<Option<Delivery>, BrokerError>;

    /// Subscribe in manual-acknowledgment mode. The stream ends when
    /// the channel or connection closes; that is the consumer's
    /// terminal state.
    async fn subscribe(&self, queue: &str) -> Result<DeliveryStream, BrokerError>;

    /// Acknowledge one delivery by tag
    async fn ack(&self, tag: DeliveryTag) -> Result<(), BrokerError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Connector that fails a configured number of times before
    /// delegating to an inner connector (or forever, with no inner)
    pub struct FlakyConnector {
        failures_left: Mutex<u32>,
        attempts: Mutex<u32>,
        inner: Option<Arc<dyn BrokerConnector>>,
    }

    impl FlakyConnector {
        /// Fail every attempt
        pub fn always_failing() -> Self {
            Self {
                failures_left: Mutex::new(u32::MAX),
                attempts: Mutex::new(0),
                inner: None,
            }
        }

        /// Fail `failures` attempts, then hand off to `inner`
        pub fn failing_times(failures: u32, inner: Arc<dyn BrokerConnector>) -> Self {
            Self {
                failures_left: Mutex::new(failures),
                attempts: Mutex::new(0),
                inner: Some(inner),
            }
        }

        pub fn attempts(&self) -> u32 {
            *self.attempts.lock().unwrap()
        }
    }

    #[async_trait]
    impl BrokerConnector for FlakyConnector {
        async fn connect(
            &self,
            host: &str,
            port: u16,
        ) -> Result<Arc<dyn BrokerConnection>, BrokerError> {
            *self.attempts.lock().unwrap() += 1;

            {
                let mut failures_left = self.failures_left.lock().unwrap();
                if *failures_left > 0 {
                    *failures_left = failures_left.saturating_sub(1);
                    return Err(BrokerError::ConnectionRefused {
                        host: host.to_string(),
                        port,
                        reason: "simulated refusal".to_string(),
                    });
                }
            }

            match &self.inner {
                Some(inner) => inner.connect(host, port).await,
                None => Err(BrokerError::ConnectionRefused {
                    host: host.to_string(),
                    port,
                    reason: "no inner connector".to_string(),
                }),
            }
        }
    }

    /// Scripted channel for unit tests: deliveries are preloaded,
    /// publishes and acks are recorded
    #[derive(Default)]
    pub struct ScriptedChannel {
        pending: Mutex<VecDeque<Delivery>>,
        published: Mutex<Vec<(String, Vec<u8>)>>,
        acked: Mutex<Vec<DeliveryTag>>,
        fetch_calls: Mutex<u32>,
        fail_publish: bool,
    }

    impl ScriptedChannel {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_publish() -> Self {
            Self {
                fail_publish: true,
                ..Self::default()
            }
        }

        pub fn preload(&self, tag: DeliveryTag, body: impl Into<Vec<u8>>) {
            self.pending.lock().unwrap().push_back(Delivery {
                tag,
                body: body.into(),
                redelivered: false,
            });
        }

        pub fn published(&self) -> Vec<(String, Vec<u8>)> {
            self.published.lock().unwrap().clone()
        }

        pub fn acked(&self) -> Vec<DeliveryTag> {
            self.acked.lock().unwrap().clone()
        }

        pub fn fetch_calls(&self) -> u32 {
            *self.fetch_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl BrokerChannel for ScriptedChannel {
        async fn declare_queue(&self, _queue: &str) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn publish(&self, queue: &str, body: Vec<u8>) -> Result<(), BrokerError> {
            if self.fail_publish {
                return Err(BrokerError::Transport("simulated publish failure".into()));
            }
            self.published
                .lock()
                .unwrap()
                .push((queue.to_string(), body));
            Ok(())
        }

        async fn fetch_one(&self, _queue: &str) -> Result<Option<Delivery>, BrokerError> {
            *self.fetch_calls.lock().unwrap() += 1;
            Ok(self.pending.lock().unwrap().pop_front())
        }

        async fn subscribe(&self, _queue: &str) -> Result<DeliveryStream, BrokerError> {
            // Finite stream: yields the preloaded deliveries then ends,
            // which models the channel closing.
            let drained: Vec<Delivery> = self.pending.lock().unwrap().drain(..).collect();
            Ok(Box::pin(futures::stream::iter(drained)))
        }

        async fn ack(&self, tag: DeliveryTag) -> Result<(), BrokerError> {
            let mut acked = self.acked.lock().unwrap();
            if acked.contains(&tag) {
                return Err(BrokerError::UnknownDeliveryTag(tag));
            }
            acked.push(tag);
            Ok(())
        }
    }
}
