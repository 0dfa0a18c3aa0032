use std::time::Duration;

use serde::Deserialize;

use crate::pool::error::PoolError;

/// How long an idle worker blocks on its queue before re-checking dismissal.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub const DEFAULT_THREAD_NAME_PREFIX: &str = "pinpool-worker-";

pub const DEFAULT_NOTIFY_PORT: u16 = 7000;

// --- Pool Configuration ---

/// Configuration for a [`Dispatcher`](crate::pool::Dispatcher).
///
/// Read once at construction; the worker count is fixed for the pool's lifetime.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of workers, and therefore of external resources created.
    pub worker_count: usize,

    /// Queue poll timeout used by idle workers to observe dismissal.
    pub poll_interval: Duration,

    /// Whether the pause gate starts closed.
    pub start_paused: bool,

    /// Worker threads are named `<prefix><index>`.
    pub thread_name_prefix: String,

    /// Delay yielded to the caller's executor before an async submit blocks.
    /// `None` yields exactly once without sleeping.
    pub submit_yield: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            start_paused: false,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            submit_yield: None,
        }
    }
}

impl PoolConfig {
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Default::default()
        }
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn start_paused(mut self, start_paused: bool) -> Self {
        self.start_paused = start_paused;
        self
    }

    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn submit_yield(mut self, delay: Option<Duration>) -> Self {
        self.submit_yield = delay;
        self
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.worker_count < 1 {
            return Err(PoolError::ConfigError(
                "pool should be created with at least 1 worker".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(PoolError::ConfigError("poll interval must be non-zero".to_string()));
        }
        Ok(())
    }
}

// --- Notification Configuration ---

/// Configuration for the notification layer.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Address the external transport should listen on.
    pub host: String,

    pub port: u16,

    /// Notifications buffered per subscriber before the slowest one lags.
    pub channel_capacity: usize,

    /// Log every broadcast notification at debug level.
    pub debug: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_NOTIFY_PORT,
            channel_capacity: 256,
            debug: false,
        }
    }
}

impl NotifyConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.channel_capacity < 1 {
            return Err(PoolError::ConfigError(
                "notification channel capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
