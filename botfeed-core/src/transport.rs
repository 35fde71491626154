//! Datafeed transport seam.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::AuthTokens;
use crate::error::TransportError;
use crate::events::RealTimeEvent;

/// A server-side datafeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
}

impl Feed {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Opaque read position in a datafeed.
///
/// The empty ack id means "no prior position".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AckId(String);

impl AckId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AckId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AckId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Result of one datafeed read: zero or more events plus the next ack id.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    /// Events in server order.
    pub events: Vec<RealTimeEvent>,
    /// Cursor to present on the next read.
    pub ack_id: AckId,
}

impl ReadResult {
    pub fn new(events: Vec<RealTimeEvent>, ack_id: impl Into<AckId>) -> Self {
        Self {
            events,
            ack_id: ack_id.into(),
        }
    }

    /// No events; the cursor stays where it was.
    pub fn empty(ack_id: AckId) -> Self {
        Self {
            events: Vec::new(),
            ack_id,
        }
    }
}

/// Operations against the server-side datafeed resource.
///
/// `read_feed` must report an unknown or invalid feed id as
/// [`TransportError::StaleFeed`], distinct from other failures.
#[async_trait]
pub trait DatafeedTransport: Send + Sync {
    /// List the datafeeds that exist for the authenticated bot.
    async fn list_feeds(&self, tokens: &AuthTokens) -> Result<Vec<Feed>, TransportError>;

    /// Create a new datafeed.
    async fn create_feed(&self, tokens: &AuthTokens) -> Result<Feed, TransportError>;

    /// Read events after `ack_id`. Implementations may block until events
    /// arrive or a server-side timeout elapses.
    async fn read_feed(
        &self,
        tokens: &AuthTokens,
        feed_id: &str,
        ack_id: &AckId,
    ) -> Result<ReadResult, TransportError>;

    /// Delete a datafeed.
    async fn delete_feed(&self, tokens: &AuthTokens, feed_id: &str) -> Result<(), TransportError>;
}
