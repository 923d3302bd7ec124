//! Daemon configuration from environment variables

use std::time::Duration;

use tracing::info;

const DEFAULT_BROKER_HOST: &str = "localhost";
const DEFAULT_BROKER_PORT: u16 = 5672;
const DEFAULT_FORWARDING_QUEUE: &str = "chorus.jobs";
const DEFAULT_FEEDBACK_QUEUE: &str = "chorus.results";
const DEFAULT_BUCKET: &str = "recordings";
const DEFAULT_BATCH_SIZE: usize = 1;
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

/// Effective daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub broker_host: String,
    pub broker_port: u16,
    pub forwarding_queue: String,
    pub feedback_queue: String,
    pub bucket: String,
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// When set, the daemon submits one built-in sample recording at
    /// startup addressed to this recipient (development convenience)
    pub demo_email: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            broker_host: env_or("CHORUS_BROKER_HOST", DEFAULT_BROKER_HOST),
            broker_port: env_parsed("CHORUS_BROKER_PORT", DEFAULT_BROKER_PORT),
            forwarding_queue: env_or("CHORUS_QUEUE_FORWARDING", DEFAULT_FORWARDING_QUEUE),
            feedback_queue: env_or("CHORUS_QUEUE_FEEDBACK", DEFAULT_FEEDBACK_QUEUE),
            bucket: env_or("CHORUS_BUCKET", DEFAULT_BUCKET),
            batch_size: env_parsed("CHORUS_BATCH_SIZE", DEFAULT_BATCH_SIZE).max(1),
            max_retries: env_parsed("CHORUS_BROKER_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            retry_delay: Duration::from_secs(env_parsed(
                "CHORUS_BROKER_RETRY_DELAY_SECS",
                DEFAULT_RETRY_DELAY_SECS,
            )),
            demo_email: std::env::var("CHORUS_DEMO_EMAIL").ok(),
        }
    }

    /// Log the effective configuration at startup
    pub fn log_config(&self) {
        info!(
            broker_host = %self.broker_host,
            broker_port = %self.broker_port,
            max_retries = %self.max_retries,
            retry_delay_secs = %self.retry_delay.as_secs(),
            "Broker configuration"
        );
        info!(
            forwarding_queue = %self.forwarding_queue,
            feedback_queue = %self.feedback_queue,
            batch_size = %self.batch_size,
            "Queue configuration"
        );
        info!(bucket = %self.bucket, "Storage configuration");
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
