//! Agent connection configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default agent base URL.
const DEFAULT_BASE_URL: &str = "https://localhost:8443";

/// Where the agent lives and how long a single request may take.
///
/// The timeout must exceed the agent's server-side long-poll window, or
/// every empty read surfaces as a network error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base URL, without the `/agent` path
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
        }
    }
}

impl AgentConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.base_url, "https://localhost:8443");
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn parses_humantime_timeout() {
        let config: AgentConfig = toml::from_str(
            r#"
            base_url = "https://agent.example.com"
            timeout = "45s"
            "#,
        )
        .unwrap();
        assert_eq!(config.base_url, "https://agent.example.com");
        assert_eq!(config.timeout, Duration::from_secs(45));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config: AgentConfig = toml::from_str("").unwrap();
        assert_eq!(config, AgentConfig::default());
    }
}
