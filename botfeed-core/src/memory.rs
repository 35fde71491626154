//! In-memory datafeed server for testing.
//!
//! Simulates the agent's datafeed resource without a network: events
//! published here fan out to every live feed and are handed out by
//! `read_feed` until a later read acknowledges them. Reads with nothing
//! pending wait up to the configured read timeout, like the agent's long
//! poll.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::auth::AuthTokens;
use crate::error::TransportError;
use crate::events::RealTimeEvent;
use crate::transport::{AckId, DatafeedTransport, Feed, ReadResult};

/// How long an empty read waits for events by default.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(250);

struct SimulatedFeed {
    id: String,
    /// Every event published since the feed was created
    events: Vec<RealTimeEvent>,
    /// Number of leading events acknowledged by a read
    acked: usize,
}

impl SimulatedFeed {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            events: Vec::new(),
            acked: 0,
        }
    }

    /// Apply an ack id previously returned by this feed.
    ///
    /// Unknown or stale ack ids leave the position unchanged, so unacked
    /// events are redelivered.
    fn acknowledge(&mut self, ack_id: &AckId) {
        let Some(upto) = ack_id
            .as_str()
            .strip_prefix("ack-")
            .and_then(|n| n.parse::<usize>().ok())
        else {
            return;
        };
        if upto > self.acked && upto <= self.events.len() {
            self.acked = upto;
        }
    }

    fn pending(&self) -> Option<ReadResult> {
        if self.acked >= self.events.len() {
            return None;
        }
        Some(ReadResult::new(
            self.events[self.acked..].to_vec(),
            format!("ack-{}", self.events.len()),
        ))
    }
}

/// In-memory implementation of [`DatafeedTransport`].
pub struct InMemoryDatafeed {
    /// Live feeds, in creation order
    feeds: Mutex<Vec<SimulatedFeed>>,
    published: Notify,
    read_timeout: Duration,
    reads: AtomicUsize,
}

impl InMemoryDatafeed {
    #[must_use]
    pub fn new() -> Self {
        Self::with_read_timeout(DEFAULT_READ_TIMEOUT)
    }

    #[must_use]
    pub fn with_read_timeout(read_timeout: Duration) -> Self {
        Self {
            feeds: Mutex::new(Vec::new()),
            published: Notify::new(),
            read_timeout,
            reads: AtomicUsize::new(0),
        }
    }

    /// Append an event to every live feed. Returns the number of feeds reached.
    pub async fn publish(&self, event: RealTimeEvent) -> usize {
        let reached = {
            let mut feeds = self.feeds.lock().await;
            for feed in feeds.iter_mut() {
                feed.events.push(event.clone());
            }
            feeds.len()
        };
        trace!(kind = %event.kind(), feeds = reached, "Published event");
        self.published.notify_waiters();
        reached
    }

    /// Forget a feed, as the agent does when a feed expires.
    ///
    /// Subsequent reads of `feed_id` fail with [`TransportError::StaleFeed`].
    pub async fn expire(&self, feed_id: &str) -> bool {
        let removed = {
            let mut feeds = self.feeds.lock().await;
            let before = feeds.len();
            feeds.retain(|f| f.id != feed_id);
            feeds.len() != before
        };
        if removed {
            debug!(feed_id, "Expired datafeed");
            self.published.notify_waiters();
        }
        removed
    }

    /// Ids of the live feeds, in creation order.
    pub async fn feed_ids(&self) -> Vec<String> {
        self.feeds.lock().await.iter().map(|f| f.id.clone()).collect()
    }

    /// Number of `read_feed` calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryDatafeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatafeedTransport for InMemoryDatafeed {
    async fn list_feeds(&self, _tokens: &AuthTokens) -> Result<Vec<Feed>, TransportError> {
        Ok(self
            .feeds
            .lock()
            .await
            .iter()
            .map(|f| Feed::new(f.id.clone()))
            .collect())
    }

    async fn create_feed(&self, _tokens: &AuthTokens) -> Result<Feed, TransportError> {
        let feed = SimulatedFeed::new();
        let id = feed.id.clone();
        self.feeds.lock().await.push(feed);
        debug!(feed_id = %id, "Created simulated datafeed");
        Ok(Feed::new(id))
    }

    async fn read_feed(
        &self,
        _tokens: &AuthTokens,
        feed_id: &str,
        ack_id: &AckId,
    ) -> Result<ReadResult, TransportError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let deadline = Instant::now() + self.read_timeout;
        let mut acknowledged = false;

        loop {
            let notified = self.published.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut feeds = self.feeds.lock().await;
                let feed = feeds
                    .iter_mut()
                    .find(|f| f.id == feed_id)
                    .ok_or_else(|| TransportError::StaleFeed {
                        feed_id: feed_id.to_string(),
                    })?;
                if !acknowledged {
                    feed.acknowledge(ack_id);
                    acknowledged = true;
                }
                if let Some(result) = feed.pending() {
                    return Ok(result);
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(ReadResult::empty(ack_id.clone()));
            }
        }
    }

    async fn delete_feed(&self, _tokens: &AuthTokens, feed_id: &str) -> Result<(), TransportError> {
        if self.expire(feed_id).await {
            Ok(())
        } else {
            Err(TransportError::StaleFeed {
                feed_id: feed_id.to_string(),
            })
        }
    }
}
