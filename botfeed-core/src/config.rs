//! Configuration for the datafeed loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff applied between retries of failed datafeed calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry.
    #[serde(default = "default_initial_interval", with = "humantime_serde")]
    pub initial_interval: Duration,

    /// Factor applied to the delay after each consecutive failure.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound for the delay.
    #[serde(default = "default_max_interval", with = "humantime_serde")]
    pub max_interval: Duration,
}

fn default_initial_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_interval() -> Duration {
    Duration::from_secs(30)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval: default_initial_interval(),
            multiplier: default_multiplier(),
            max_interval: default_max_interval(),
        }
    }
}

impl RetryConfig {
    /// Constant delay between retries.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_interval: interval,
            multiplier: 1.0,
            max_interval: interval,
        }
    }
}

/// Configuration for [`DatafeedLoop`](crate::DatafeedLoop).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatafeedConfig {
    #[serde(default)]
    pub retry: RetryConfig,

    /// Attempts at obtaining a feed id before `start()` gives up.
    #[serde(default = "default_setup_attempts")]
    pub setup_attempts: u32,

    /// Username of the bot itself. Events it initiated are not delivered
    /// to listeners that keep the default acceptance filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_username: Option<String>,
}

fn default_setup_attempts() -> u32 {
    3
}

impl Default for DatafeedConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            setup_attempts: default_setup_attempts(),
            bot_username: None,
        }
    }
}

impl DatafeedConfig {
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_setup_attempts(mut self, attempts: u32) -> Self {
        self.setup_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }
}
