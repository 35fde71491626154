//! Datafeed lifecycle: discovery, creation and stale-feed replacement.

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::AuthSession;
use crate::error::Result;
use crate::transport::{DatafeedTransport, Feed};

/// Obtains a usable feed id for the loop.
pub struct FeedLifecycle {
    transport: Arc<dyn DatafeedTransport>,
    auth: Arc<dyn AuthSession>,
}

impl FeedLifecycle {
    pub fn new(transport: Arc<dyn DatafeedTransport>, auth: Arc<dyn AuthSession>) -> Self {
        Self { transport, auth }
    }

    /// Reuse the first existing feed, or create one if none exist.
    pub async fn ensure_feed(&self) -> Result<Feed> {
        let tokens = self.auth.tokens().await?;
        let feeds = self.transport.list_feeds(&tokens).await?;

        if let Some(feed) = feeds.into_iter().next() {
            info!(feed_id = %feed.id, "Reusing existing datafeed");
            return Ok(feed);
        }

        let feed = self.transport.create_feed(&tokens).await?;
        info!(feed_id = %feed.id, "Created datafeed");
        Ok(feed)
    }

    /// Replace a feed the server no longer recognizes.
    ///
    /// Deleting the stale feed is best-effort; a failure is logged and the
    /// replacement is created regardless. The caller must restart reading
    /// from an empty ack id.
    pub async fn recover_from_stale(&self, stale_feed_id: &str) -> Result<Feed> {
        let tokens = self.auth.tokens().await?;

        if let Err(e) = self.transport.delete_feed(&tokens, stale_feed_id).await {
            warn!(feed_id = %stale_feed_id, error = %e, "Failed to delete stale datafeed");
        }

        let feed = self.transport.create_feed(&tokens).await?;
        info!(stale_feed_id = %stale_feed_id, feed_id = %feed.id, "Recreated datafeed");
        Ok(feed)
    }
}

impl std::fmt::Debug for FeedLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedLifecycle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::auth::{AuthTokens, StaticAuthSession};
    use crate::error::{Error, TransportError};
    use crate::transport::{AckId, ReadResult};

    #[derive(Default)]
    struct FakeTransport {
        existing: Vec<Feed>,
        fail_create: bool,
        fail_delete: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DatafeedTransport for FakeTransport {
        async fn list_feeds(&self, _: &AuthTokens) -> std::result::Result<Vec<Feed>, TransportError> {
            self.calls.lock().unwrap().push("list".to_string());
            Ok(self.existing.clone())
        }

        async fn create_feed(&self, _: &AuthTokens) -> std::result::Result<Feed, TransportError> {
            self.calls.lock().unwrap().push("create".to_string());
            if self.fail_create {
                return Err(TransportError::Status {
                    status: 500,
                    body: "down".to_string(),
                });
            }
            Ok(Feed::new("created"))
        }

        async fn read_feed(
            &self,
            _: &AuthTokens,
            _: &str,
            ack_id: &AckId,
        ) -> std::result::Result<ReadResult, TransportError> {
            Ok(ReadResult::empty(ack_id.clone()))
        }

        async fn delete_feed(
            &self,
            _: &AuthTokens,
            feed_id: &str,
        ) -> std::result::Result<(), TransportError> {
            self.calls.lock().unwrap().push(format!("delete:{feed_id}"));
            if self.fail_delete {
                return Err(TransportError::Network("reset".to_string()));
            }
            Ok(())
        }
    }

    fn lifecycle(transport: &Arc<FakeTransport>) -> FeedLifecycle {
        FeedLifecycle::new(
            Arc::clone(transport) as Arc<dyn DatafeedTransport>,
            Arc::new(StaticAuthSession::new("session_token", "km_token")),
        )
    }

    #[tokio::test]
    async fn ensure_feed_creates_when_none_exist() {
        let transport = Arc::new(FakeTransport::default());

        let feed = lifecycle(&transport).ensure_feed().await.unwrap();

        assert_eq!(feed.id, "created");
        assert_eq!(transport.calls(), vec!["list", "create"]);
    }

    #[tokio::test]
    async fn ensure_feed_reuses_first_listed() {
        let transport = Arc::new(FakeTransport {
            existing: vec![Feed::new("first"), Feed::new("second")],
            ..Default::default()
        });

        let feed = lifecycle(&transport).ensure_feed().await.unwrap();

        assert_eq!(feed.id, "first");
        assert_eq!(transport.calls(), vec!["list"]);
    }

    #[tokio::test]
    async fn ensure_feed_propagates_create_failure() {
        let transport = Arc::new(FakeTransport {
            fail_create: true,
            ..Default::default()
        });

        let result = lifecycle(&transport).ensure_feed().await;

        assert!(matches!(result, Err(Error::Transport(TransportError::Status { status: 500, .. }))));
    }

    #[tokio::test]
    async fn recover_deletes_then_creates() {
        let transport = Arc::new(FakeTransport::default());

        let feed = lifecycle(&transport).recover_from_stale("old").await.unwrap();

        assert_eq!(feed.id, "created");
        assert_eq!(transport.calls(), vec!["delete:old", "create"]);
    }

    #[tokio::test]
    async fn recover_survives_delete_failure() {
        let transport = Arc::new(FakeTransport {
            fail_delete: true,
            ..Default::default()
        });

        let feed = lifecycle(&transport).recover_from_stale("old").await.unwrap();

        assert_eq!(feed.id, "created");
        assert_eq!(transport.calls(), vec!["delete:old", "create"]);
    }
}
