//! Error types for botfeed-agent

use thiserror::Error;

/// Failures constructing an [`AgentClient`](crate::AgentClient)
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid agent base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
