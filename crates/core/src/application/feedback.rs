// Feedback Poller - Results queue to notifier bridge
// A cooperative polling loop, not a blocking subscription: polling
// allows drain-to-completion shutdown without severing an active
// blocking read. States are {running, stopped}; the only transition
// is running -> stopped and a stopped poller must be restarted as a
// new invocation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info};

use crate::domain::ResultMessage;
use crate::error::{AppError, Result};
use crate::port::broker::BrokerChannel;
use crate::port::notifier::Notifier;

/// Fixed suspension when the queue is found empty
const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Cooperative stop flag, observed between message fetches.
/// Not a preemption mechanism: the in-flight message always completes.
#[derive(Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Check whether a stop was requested
    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Stop requester
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Ask the poller to stop after draining the current message
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a stop channel
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

/// Polls the feedback queue and hands each result to a handler
pub struct FeedbackPoller {
    channel: Arc<dyn BrokerChannel>,
    queue: String,
    poll_interval: Duration,
}

impl FeedbackPoller {
    pub fn new(channel: Arc<dyn BrokerChannel>, queue: impl Into<String>) -> Self {
        Self {
            channel,
            queue: queue.into(),
            poll_interval: IDLE_POLL_INTERVAL,
        }
    }

    /// Override the idle poll interval (tests)
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run until `stop` is observed
    ///
    /// Per message: invoke the handler, ack on success, leave the
    /// delivery unacknowledged on failure so the broker redelivers it
    /// after this session ends. The stop flag is observed after each
    /// handled message and at every empty fetch, so a busy queue
    /// cannot starve shutdown while the in-flight message still
    /// drains to completion.
    pub async fn run<F, Fut>(&self, mut handler: F, stop: StopSignal) -> Result<()>
    where
        F: FnMut(ResultMessage) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        info!(queue = %self.queue, "Feedback poller started");

        loop {
            match self.channel.fetch_one(&self.queue).await? {
                Some(delivery) => {
                    match ResultMessage::from_bytes(&delivery.body) {
                        Ok(message) => {
                            let ticket = message.job.ticket_number.clone();
                            match handler(message).await {
                                Ok(()) => {
                                    self.channel.ack(delivery.tag).await?;
                                }
                                Err(e) => {
                                    // Left unacked: redelivered after
                                    // the session ends
                                    error!(
                                        queue = %self.queue,
                                        ticket = %ticket,
                                        tag = %delivery.tag,
                                        error = %e,
                                        "Feedback handler failed; leaving message unacknowledged"
                                    );
                                }
                            }
                        }
                        Err(e) => {
                            // Producer-owned queue: a malformed body is
                            // deploy skew, worth redelivering rather
                            // than poison-dropping
                            error!(
                                queue = %self.queue,
                                tag = %delivery.tag,
                                error = %e,
                                "Undecodable feedback message; leaving it unacknowledged"
                            );
                        }
                    }
                    if stop.is_set() {
                        break;
                    }
                }
                None => {
                    if stop.is_set() {
                        break;
                    }
                    sleep(self.poll_interval).await;
                }
            }
        }

        info!(queue = %self.queue, "Feedback poller stopped");
        Ok(())
    }
}

/// Bridges one ResultMessage to the downstream notifier
pub struct ResultDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl ResultDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Deliver the result artifact reference for one completed job
    pub async fn dispatch(&self, message: ResultMessage) -> Result<()> {
        info!(
            ticket = %message.job.ticket_number,
            recipient = %message.job.email,
            score = ?message.classification_score,
            "Dispatching result notification"
        );
        self.notifier
            .notify(
                &message.job.email,
                &message.job.result_artifact_path,
                &message.job.ticket_number,
            )
            .await
            .map_err(|e| AppError::Handler(e.to_string()))
    }
}
