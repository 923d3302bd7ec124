// In-Process Broker Adapter
// A single-broker-instance message queue with the delivery semantics
// the core relies on: queue-level FIFO for first deliveries, manual
// acknowledgment with broker-assigned tags, and redelivery of
// unacknowledged messages once the owning session closes. Network
// broker adapters implement the same three port traits out of tree.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use tokio::sync::{watch, Notify};
use tracing::{debug, info};

use chorus_core::port::broker::{
    BrokerChannel, BrokerConnection, BrokerConnector, BrokerError, Delivery, DeliveryStream,
    DeliveryTag,
};

struct ReadyMessage {
    body: Vec<u8>,
    redelivered: bool,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<ReadyMessage>,
    notify: Arc<Notify>,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, QueueState>,
    next_tag: DeliveryTag,
}

impl BrokerState {
    fn queue_mut(&mut self, queue: &str) -> &mut QueueState {
        self.queues.entry(queue.to_string()).or_default()
    }
}

/// The broker itself: shared by every connection it hands out
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    connections: Arc<Mutex<Vec<Weak<ConnectionInner>>>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector handing out sessions against this broker
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            broker: self.clone(),
        }
    }

    /// Messages currently ready for delivery on one queue
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .queues
            .get(queue)
            .map(|q| q.ready.len())
            .unwrap_or(0)
    }

    /// Drop every open connection, as a crashing broker would.
    /// Unacknowledged deliveries return to their queues marked
    /// redelivered.
    pub fn drop_connections(&self) {
        let connections: Vec<_> = self.connections.lock().unwrap().drain(..).collect();
        for connection in connections {
            if let Some(connection) = connection.upgrade() {
                connection.close();
            }
        }
    }

    fn open_connection(&self) -> Arc<ConnectionInner> {
        let (closed_tx, closed_rx) = watch::channel(false);
        let connection = Arc::new(ConnectionInner {
            state: Arc::clone(&self.state),
            open: AtomicBool::new(true),
            closed_tx,
            closed_rx,
            unacked: Mutex::new(HashMap::new()),
        });
        self.connections
            .lock()
            .unwrap()
            .push(Arc::downgrade(&connection));
        connection
    }
}

struct PendingAck {
    queue: String,
    body: Vec<u8>,
}

/// One session: owns the unacked set that redelivers on close
struct ConnectionInner {
    state: Arc<Mutex<BrokerState>>,
    open: AtomicBool,
    closed_tx: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
    unacked: Mutex<HashMap<DeliveryTag, PendingAck>>,
}

impl ConnectionInner {
    fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        let pending: Vec<PendingAck> = self.unacked.lock().unwrap().drain().map(|(_, p)| p).collect();
        if !pending.is_empty() {
            info!(
                redelivered = pending.len(),
                "Session closed with unacknowledged deliveries, requeueing"
            );
        }
        let mut state = self.state.lock().unwrap();
        for p in pending {
            let queue = state.queue_mut(&p.queue);
            queue.ready.push_back(ReadyMessage {
                body: p.body,
                redelivered: true,
            });
            queue.notify.notify_one();
        }
        drop(state);
        let _ = self.closed_tx.send(true);
    }

    fn try_fetch(&self, queue: &str) -> Option<Delivery> {
        let mut state = self.state.lock().unwrap();
        let queue_state = state.queue_mut(queue);
        let message = queue_state.ready.pop_front()?;
        state.next_tag += 1;
        let tag = state.next_tag;
        drop(state);

        self.unacked.lock().unwrap().insert(
            tag,
            PendingAck {
                queue: queue.to_string(),
                body: message.body.clone(),
            },
        );
        Some(Delivery {
            tag,
            body: message.body,
            redelivered: message.redelivered,
        })
    }
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        self.close();
    }
}

struct MemoryConnection {
    inner: Arc<ConnectionInner>,
}

#[async_trait]
impl BrokerConnection for MemoryConnection {
    fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    async fn open_channel(&self) -> Result<Arc<dyn BrokerChannel>, BrokerError> {
        if !self.is_open() {
            return Err(BrokerError::ConnectionClosed);
        }
        Ok(Arc::new(MemoryChannel {
            connection: Arc::clone(&self.inner),
        }))
    }
}

struct MemoryChannel {
    connection: Arc<ConnectionInner>,
}

impl MemoryChannel {
    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.connection.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrokerError::ChannelClosed)
        }
    }
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let mut state = self.connection.state.lock().unwrap();
        state.queue_mut(queue);
        debug!(queue = %queue, "Queue declared");
        Ok(())
    }

    async fn publish(&self, queue: &str, body: Vec<u8>) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let mut state = self.connection.state.lock().unwrap();
        let queue_state = state.queue_mut(queue);
        queue_state.ready.push_back(ReadyMessage {
            body,
            redelivered: false,
        });
        queue_state.notify.notify_one();
        Ok(())
    }

    async fn fetch_one(&self, queue: &str) -> Result<Option<Delivery>, BrokerError> {
        self.ensure_open()?;
        Ok(self.connection.try_fetch(queue))
    }

    async fn subscribe(&self, queue: &str) -> Result<DeliveryStream, BrokerError> {
        self.ensure_open()?;
        let notify = {
            let mut state = self.connection.state.lock().unwrap();
            Arc::clone(&state.queue_mut(queue).notify)
        };

        struct SubscribeCtx {
            connection: Arc<ConnectionInner>,
            queue: String,
            notify: Arc<Notify>,
            closed: watch::Receiver<bool>,
        }

        let ctx = SubscribeCtx {
            connection: Arc::clone(&self.connection),
            queue: queue.to_string(),
            notify,
            closed: self.connection.closed_rx.clone(),
        };

        let stream = futures::stream::unfold(ctx, |mut ctx| async move {
            loop {
                if !ctx.connection.open.load(Ordering::SeqCst) {
                    return None;
                }
                if let Some(delivery) = ctx.connection.try_fetch(&ctx.queue) {
                    return Some((delivery, ctx));
                }
                tokio::select! {
                    _ = ctx.notify.notified() => {}
                    _ = ctx.closed.changed() => {}
                }
            }
        });
        Ok(Box::pin(stream))
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<(), BrokerError> {
        match self.connection.unacked.lock().unwrap().remove(&tag) {
            Some(_) => Ok(()),
            None => Err(BrokerError::UnknownDeliveryTag(tag)),
        }
    }
}

/// Hands out sessions against one in-process broker
pub struct MemoryConnector {
    broker: MemoryBroker,
}

#[async_trait]
impl BrokerConnector for MemoryConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Arc<dyn BrokerConnection>, BrokerError> {
        debug!(host = %host, port = %port, "Opening in-process broker session");
        Ok(Arc::new(MemoryConnection {
            inner: self.broker.open_connection(),
        }))
    }
}
