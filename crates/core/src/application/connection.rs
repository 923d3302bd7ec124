// Connection Manager - Broker connection lifecycle
// Owns the process-wide connection handle. Establishes it with
// bounded fixed-interval retry and lazily reconnects when the cached
// handle is absent or closed. The slot is mutex-guarded so at most
// one reconnect proceeds at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::port::broker::{BrokerChannel, BrokerConnection, BrokerConnector};

/// Connection parameters
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl ConnectionSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            max_retries: 5,
            retry_delay: Duration::from_secs(5),
        }
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

/// Manages the shared broker connection
pub struct ConnectionManager {
    connector: Arc<dyn BrokerConnector>,
    settings: ConnectionSettings,
    slot: Mutex<Option<Arc<dyn BrokerConnection>>>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn BrokerConnector>, settings: ConnectionSettings) -> Self {
        Self {
            connector,
            settings,
            slot: Mutex::new(None),
        }
    }

    /// Establish a connection with bounded retry
    ///
    /// Makes up to `max_retries` attempts, sleeping `retry_delay`
    /// between attempts (fixed interval, not exponential). Exhausting
    /// the budget is fatal: the caller must not retry further without
    /// operator intervention.
    pub async fn connect(&self) -> Result<Arc<dyn BrokerConnection>> {
        let ConnectionSettings {
            host,
            port,
            max_retries,
            retry_delay,
        } = &self.settings;

        let mut last_reason = String::from("no connection attempts made");

        for attempt in 1..=*max_retries {
            info!(
                host = %host,
                port = %port,
                attempt = %attempt,
                max_retries = %max_retries,
                "Attempting broker connection"
            );
            match self.connector.connect(host, *port).await {
                Ok(connection) => {
                    info!(host = %host, port = %port, "Broker connection established");
                    return Ok(connection);
                }
                Err(e) => {
                    warn!(
                        attempt = %attempt,
                        error = %e,
                        retry_delay_ms = %retry_delay.as_millis(),
                        "Broker connection attempt failed"
                    );
                    last_reason = e.to_string();
                    if attempt < *max_retries {
                        sleep(*retry_delay).await;
                    }
                }
            }
        }

        Err(AppError::ConnectionExhausted {
            attempts: *max_retries,
            reason: last_reason,
        })
    }

    /// Return the cached connection, reconnecting if it is absent or
    /// closed. Concurrent callers serialize on the slot lock, so a
    /// closed connection is replaced exactly once.
    pub async fn get_or_reconnect(&self) -> Result<Arc<dyn BrokerConnection>> {
        let mut slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(connection) if connection.is_open() => Ok(Arc::clone(connection)),
            _ => {
                info!("Broker connection absent or closed, establishing a new one");
                let connection = self.connect().await?;
                *slot = Some(Arc::clone(&connection));
                Ok(connection)
            }
        }
    }

    /// Open a fresh channel over the managed connection
    pub async fn open_channel(&self) -> Result<Arc<dyn BrokerChannel>> {
        let connection = self.get_or_reconnect().await?;
        Ok(connection.open_channel().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::broker::mocks::FlakyConnector;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_exhausts_budget_with_always_failing_transport() {
        let connector = Arc::new(FlakyConnector::always_failing());
        let settings = ConnectionSettings::new("broker", 5672)
            .max_retries(3)
            .retry_delay(Duration::from_millis(20));
        let manager = ConnectionManager::new(connector.clone(), settings);

        let started = Instant::now();
        let err = manager.connect().await.unwrap_err();

        assert!(matches!(
            err,
            AppError::ConnectionExhausted { attempts: 3, .. }
        ));
        assert_eq!(connector.attempts(), 3);
        // Two sleeps separate three attempts
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_get_or_reconnect_is_fatal_after_exhaustion() {
        let connector = Arc::new(FlakyConnector::always_failing());
        let settings = ConnectionSettings::new("broker", 5672)
            .max_retries(2)
            .retry_delay(Duration::from_millis(1));
        let manager = ConnectionManager::new(connector, settings);

        let err = manager.get_or_reconnect().await.unwrap_err();
        assert!(matches!(err, AppError::ConnectionExhausted { .. }));
    }
}
