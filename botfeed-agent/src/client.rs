//! HTTP client for the agent's datafeed endpoints.

use async_trait::async_trait;
use botfeed_core::{AckId, AuthTokens, DatafeedTransport, Feed, ReadResult, TransportError};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::wire::{ReadRequest, ReadResponse, decode_events};

const DATAFEEDS_PATH: &str = "agent/v5/datafeeds";
const SESSION_TOKEN_HEADER: &str = "sessionToken";
const KEY_MANAGER_TOKEN_HEADER: &str = "keyManagerToken";

/// Agent REST implementation of [`DatafeedTransport`].
#[derive(Debug, Clone)]
pub struct AgentClient {
    client: Client,
    base_url: String,
}

impl AgentClient {
    /// Create a client for the agent described by `config`.
    pub fn new(config: &AgentConfig) -> Result<Self, AgentError> {
        let url = Url::parse(&config.base_url).map_err(|e| AgentError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AgentError::InvalidBaseUrl {
                url: config.base_url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn datafeeds_url(&self) -> String {
        format!("{}/{}", self.base_url, DATAFEEDS_PATH)
    }

    fn feed_url(&self, feed_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            DATAFEEDS_PATH,
            urlencoding::encode(feed_id)
        )
    }

    fn request(&self, method: Method, url: &str, tokens: &AuthTokens) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(SESSION_TOKEN_HEADER, tokens.session_token())
            .header(KEY_MANAGER_TOKEN_HEADER, tokens.key_manager_token())
    }
}

/// Map transport-level reqwest failures.
fn network_error(e: reqwest::Error) -> TransportError {
    if e.is_decode() {
        TransportError::Decode(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}

/// Turn a non-2xx response into the matching [`TransportError`].
///
/// For feed-scoped calls, `400` and `404` mean the feed id is no longer valid.
async fn check_status(
    response: Response,
    feed_id: Option<&str>,
) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match (status, feed_id) {
        (StatusCode::UNAUTHORIZED, _) => Err(TransportError::Unauthorized),
        (StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND, Some(feed_id)) => {
            Err(TransportError::StaleFeed {
                feed_id: feed_id.to_string(),
            })
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let bytes = response.bytes().await.map_err(network_error)?;
    serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
}

#[async_trait]
impl DatafeedTransport for AgentClient {
    async fn list_feeds(&self, tokens: &AuthTokens) -> Result<Vec<Feed>, TransportError> {
        let response = self
            .request(Method::GET, &self.datafeeds_url(), tokens)
            .send()
            .await
            .map_err(network_error)?;
        let response = check_status(response, None).await?;

        let feeds: Option<Vec<Feed>> = decode_json(response).await?;
        let feeds = feeds.unwrap_or_default();
        debug!(count = feeds.len(), "Listed datafeeds");
        Ok(feeds)
    }

    async fn create_feed(&self, tokens: &AuthTokens) -> Result<Feed, TransportError> {
        let response = self
            .request(Method::POST, &self.datafeeds_url(), tokens)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(network_error)?;
        let response = check_status(response, None).await?;

        decode_json(response).await
    }

    async fn read_feed(
        &self,
        tokens: &AuthTokens,
        feed_id: &str,
        ack_id: &AckId,
    ) -> Result<ReadResult, TransportError> {
        let url = format!("{}/read", self.feed_url(feed_id));
        let response = self
            .request(Method::POST, &url, tokens)
            .json(&ReadRequest {
                ack_id: ack_id.as_str(),
            })
            .send()
            .await
            .map_err(network_error)?;
        let response = check_status(response, Some(feed_id)).await?;

        if response.status() == StatusCode::NO_CONTENT {
            trace!(feed_id, "Datafeed read returned no content");
            return Ok(ReadResult::empty(ack_id.clone()));
        }

        let body: ReadResponse = decode_json(response).await?;
        let events = decode_events(body.events.unwrap_or_default());
        let next = body.ack_id.map(AckId::from).unwrap_or_else(|| ack_id.clone());
        trace!(feed_id, count = events.len(), ack_id = %next, "Datafeed read");
        Ok(ReadResult::new(events, next))
    }

    async fn delete_feed(&self, tokens: &AuthTokens, feed_id: &str) -> Result<(), TransportError> {
        let response = self
            .request(Method::DELETE, &self.feed_url(feed_id), tokens)
            .send()
            .await
            .map_err(network_error)?;
        check_status(response, Some(feed_id)).await?;
        debug!(feed_id, "Deleted datafeed");
        Ok(())
    }
}
