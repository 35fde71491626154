use std::time::Duration;

use botfeed_agent::AgentConfig;
use botfeed_core::{DatafeedConfig, RetryConfig};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawBotfeedConfig {
    #[serde(default)]
    pub agent: RawAgentSection,

    #[serde(default)]
    pub auth: RawAuthSection,

    #[serde(default)]
    pub datafeed: RawDatafeedSection,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawAgentSection {
    pub base_url: Option<String>,

    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawAuthSection {
    pub session_token: Option<String>,
    pub key_manager_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawDatafeedSection {
    pub bot_username: Option<String>,
    pub setup_attempts: Option<u32>,

    #[serde(default)]
    pub retry: RawRetrySection,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRetrySection {
    #[serde(default, with = "humantime_serde")]
    pub initial_interval: Option<Duration>,

    pub multiplier: Option<f64>,

    #[serde(default, with = "humantime_serde")]
    pub max_interval: Option<Duration>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Default)]
pub struct BotfeedConfig {
    pub agent: AgentConfig,
    pub auth: AuthSection,
    pub datafeed: DatafeedConfig,
}

/// Pre-acquired agent credentials
#[derive(Debug, Clone, Serialize, Default)]
pub struct AuthSection {
    #[serde(serialize_with = "redacted", skip_serializing_if = "Option::is_none")]
    pub session_token: Option<SecretString>,

    #[serde(serialize_with = "redacted", skip_serializing_if = "Option::is_none")]
    pub key_manager_token: Option<SecretString>,
}

impl AuthSection {
    /// Both tokens, if configured.
    pub fn tokens(&self) -> Option<(&str, &str)> {
        match (&self.session_token, &self.key_manager_token) {
            (Some(session), Some(key_manager)) => {
                Some((session.expose_secret(), key_manager.expose_secret()))
            }
            _ => None,
        }
    }
}

fn redacted<S: Serializer>(_: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("[REDACTED]")
}

impl RawRetrySection {
    pub(super) fn finalize(self) -> RetryConfig {
        let defaults = RetryConfig::default();
        RetryConfig {
            initial_interval: self.initial_interval.unwrap_or(defaults.initial_interval),
            multiplier: self.multiplier.unwrap_or(defaults.multiplier),
            max_interval: self.max_interval.unwrap_or(defaults.max_interval),
        }
    }
}
