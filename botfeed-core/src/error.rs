//! Error types for botfeed-core

use thiserror::Error;

/// Top-level error type for botfeed-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}

/// Result type alias for botfeed-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a datafeed transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The server no longer recognizes the feed id
    #[error("Datafeed {feed_id} not found or no longer valid")]
    StaleFeed { feed_id: String },

    /// Session or key manager token rejected
    #[error("Unauthorized: session rejected by agent")]
    Unauthorized,

    #[error("Agent returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode agent response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether this is the distinguished "feed not found / invalid" signal
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleFeed { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Errors from the auth session provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Tokens unavailable: {0}")]
    Unavailable(String),

    #[error("Session refresh failed: {0}")]
    RefreshFailed(String),
}

/// Failure raised by a listener handler
#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ListenerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
