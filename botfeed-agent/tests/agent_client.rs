//! AgentClient against an in-process fake agent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use botfeed_agent::{AgentClient, AgentConfig};
use botfeed_core::events::{EventPayload, Initiator, MessageSent};
use botfeed_core::{
    AckId, AuthTokens, DatafeedConfig, DatafeedLoop, DatafeedTransport, HandlerResult,
    RealTimeEventListener, RetryConfig, StaticAuthSession, TransportError,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

// ─── Fake agent ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Seen {
    route: String,
    session: Option<String>,
    key_manager: Option<String>,
    body: Option<Value>,
}

#[derive(Default)]
struct FakeAgent {
    feeds: Vec<String>,
    reads: Mutex<VecDeque<Value>>,
    seen: Mutex<Vec<Seen>>,
}

impl FakeAgent {
    fn with_feeds(feeds: &[&str]) -> Self {
        Self {
            feeds: feeds.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    fn queue_read(&self, body: Value) {
        self.reads.lock().unwrap().push_back(body);
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn record(&self, route: impl Into<String>, headers: &HeaderMap, body: Option<Value>) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        self.seen.lock().unwrap().push(Seen {
            route: route.into(),
            session: header("sessiontoken"),
            key_manager: header("keymanagertoken"),
            body,
        });
    }
}

async fn list_feeds(State(agent): State<Arc<FakeAgent>>, headers: HeaderMap) -> Json<Value> {
    agent.record("list", &headers, None);
    let feeds: Vec<Value> = agent.feeds.iter().map(|id| json!({ "id": id })).collect();
    Json(Value::Array(feeds))
}

async fn create_feed(State(agent): State<Arc<FakeAgent>>, headers: HeaderMap) -> Response {
    agent.record("create", &headers, None);
    (
        StatusCode::CREATED,
        Json(json!({ "id": "F-created", "createdAt": 1_700_000_000_000_i64 })),
    )
        .into_response()
}

async fn read_feed(
    State(agent): State<Arc<FakeAgent>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    agent.record(format!("read:{id}"), &headers, Some(body));
    let next = agent.reads.lock().unwrap().pop_front();
    match next {
        Some(body) => Json(body).into_response(),
        None => {
            tokio::time::sleep(Duration::from_millis(20)).await;
            StatusCode::NO_CONTENT.into_response()
        }
    }
}

async fn delete_feed(
    State(agent): State<Arc<FakeAgent>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> StatusCode {
    agent.record(format!("delete:{id}"), &headers, None);
    StatusCode::NO_CONTENT
}

fn router(agent: Arc<FakeAgent>) -> Router {
    Router::new()
        .route("/agent/v5/datafeeds", get(list_feeds).post(create_feed))
        .route("/agent/v5/datafeeds/:id/read", post(read_feed))
        .route("/agent/v5/datafeeds/:id", delete(delete_feed))
        .with_state(agent)
}

/// Serve `router` on an ephemeral port and return its base URL.
async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    format!("http://{addr}")
}

/// Agent whose read endpoint always answers with `status`.
async fn spawn_read_status(status: StatusCode) -> String {
    let router = Router::new().route(
        "/agent/v5/datafeeds/:id/read",
        post(move || async move { (status, "agent says no") }),
    );
    spawn(router).await
}

fn client(base_url: &str) -> AgentClient {
    AgentClient::new(&AgentConfig::new(base_url).with_timeout(Duration::from_secs(5))).unwrap()
}

fn tokens() -> AuthTokens {
    AuthTokens::new("session_token", "km_token")
}

fn message_event(id: &str, message_id: &str) -> Value {
    json!({
        "id": id,
        "timestamp": 1_700_000_000_000_i64,
        "type": "MESSAGESENT",
        "initiator": { "user": { "userId": 1, "username": "alice" } },
        "payload": { "messageSent": { "message": { "messageId": message_id, "message": "hi" } } }
    })
}

// ─── Endpoints ───────────────────────────────────────────────────────────

#[tokio::test]
async fn list_and_create_send_auth_headers() {
    let agent = Arc::new(FakeAgent::with_feeds(&["F1", "F2"]));
    let client = client(&spawn(router(Arc::clone(&agent))).await);

    let feeds = client.list_feeds(&tokens()).await.unwrap();
    let created = client.create_feed(&tokens()).await.unwrap();

    let ids: Vec<&str> = feeds.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["F1", "F2"]);
    assert_eq!(created.id, "F-created");

    let seen = agent.seen();
    assert_eq!(seen.len(), 2);
    for request in &seen {
        assert_eq!(request.session.as_deref(), Some("session_token"));
        assert_eq!(request.key_manager.as_deref(), Some("km_token"));
    }
}

#[tokio::test]
async fn read_sends_ack_and_decodes_events() {
    let agent = Arc::new(FakeAgent::default());
    agent.queue_read(json!({
        "events": [
            message_event("e1", "m1"),
            { "id": "e2", "type": "SOMETHINGNEW", "payload": { "somethingNew": {} } },
            { "id": "e3", "type": "ROOMCREATED", "payload": { "roomCreated": { "stream": { "streamId": "r1" } } } }
        ],
        "ackId": "A2"
    }));
    let client = client(&spawn(router(Arc::clone(&agent))).await);

    let result = client
        .read_feed(&tokens(), "F1", &AckId::new("A1"))
        .await
        .unwrap();

    assert_eq!(result.ack_id.as_str(), "A2");
    let ids: Vec<&str> = result.events.iter().filter_map(|e| e.id.as_deref()).collect();
    assert_eq!(ids, vec!["e1", "e3"]);
    assert!(matches!(result.events[0].payload, EventPayload::MessageSent(_)));

    let seen = agent.seen();
    assert_eq!(seen[0].route, "read:F1");
    assert_eq!(seen[0].body, Some(json!({ "ackId": "A1" })));
}

#[tokio::test]
async fn read_no_content_keeps_cursor() {
    let agent = Arc::new(FakeAgent::default());
    let client = client(&spawn(router(agent)).await);

    let result = client
        .read_feed(&tokens(), "F1", &AckId::new("A7"))
        .await
        .unwrap();

    assert!(result.events.is_empty());
    assert_eq!(result.ack_id.as_str(), "A7");
}

#[tokio::test]
async fn delete_targets_feed() {
    let agent = Arc::new(FakeAgent::default());
    let client = client(&spawn(router(Arc::clone(&agent))).await);

    client.delete_feed(&tokens(), "F1").await.unwrap();

    assert_eq!(agent.seen()[0].route, "delete:F1");
}

// ─── Status mapping ──────────────────────────────────────────────────────

#[tokio::test]
async fn read_not_found_is_stale_feed() {
    for status in [StatusCode::NOT_FOUND, StatusCode::BAD_REQUEST] {
        let client = client(&spawn_read_status(status).await);

        let result = client.read_feed(&tokens(), "F1", &AckId::default()).await;

        assert_eq!(
            result.unwrap_err(),
            TransportError::StaleFeed {
                feed_id: "F1".to_string()
            },
            "status {status}"
        );
    }
}

#[tokio::test]
async fn read_unauthorized_is_distinguished() {
    let client = client(&spawn_read_status(StatusCode::UNAUTHORIZED).await);

    let result = client.read_feed(&tokens(), "F1", &AckId::default()).await;

    assert_eq!(result.unwrap_err(), TransportError::Unauthorized);
}

#[tokio::test]
async fn read_server_error_carries_status_and_body() {
    let client = client(&spawn_read_status(StatusCode::SERVICE_UNAVAILABLE).await);

    let result = client.read_feed(&tokens(), "F1", &AckId::default()).await;

    assert_eq!(
        result.unwrap_err(),
        TransportError::Status {
            status: 503,
            body: "agent says no".to_string()
        }
    );
}

#[tokio::test]
async fn list_not_found_is_not_stale() {
    let router = Router::new().route(
        "/agent/v5/datafeeds",
        get(|| async { StatusCode::NOT_FOUND }),
    );
    let client = client(&spawn(router).await);

    let result = client.list_feeds(&tokens()).await;

    assert!(matches!(
        result,
        Err(TransportError::Status { status: 404, .. })
    ));
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let router = Router::new().route(
        "/agent/v5/datafeeds/:id/read",
        post(|| async { "this is not json" }),
    );
    let client = client(&spawn(router).await);

    let result = client.read_feed(&tokens(), "F1", &AckId::default()).await;

    assert!(matches!(result, Err(TransportError::Decode(_))));
}

#[tokio::test]
async fn unreachable_agent_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = client(&format!("http://{addr}"));

    let result = client.list_feeds(&tokens()).await;

    assert!(matches!(result, Err(TransportError::Network(_))));
}

// ─── Loop over HTTP ──────────────────────────────────────────────────────

#[derive(Default)]
struct Collect {
    message_ids: Mutex<Vec<String>>,
}

#[async_trait]
impl RealTimeEventListener for Collect {
    async fn on_message_sent(&self, _initiator: &Initiator, event: &MessageSent) -> HandlerResult {
        if let Some(message) = &event.message {
            self.message_ids
                .lock()
                .unwrap()
                .push(message.message_id.clone());
        }
        Ok(())
    }
}

#[tokio::test]
async fn datafeed_loop_polls_agent() {
    let agent = Arc::new(FakeAgent::default());
    agent.queue_read(json!({ "events": [message_event("e1", "m1")], "ackId": "A1" }));
    let base_url = spawn(router(Arc::clone(&agent))).await;

    let datafeed = DatafeedLoop::new(
        Arc::new(client(&base_url)),
        Arc::new(StaticAuthSession::new("session_token", "km_token")),
        DatafeedConfig::default().with_retry(RetryConfig::fixed(Duration::from_millis(5))),
    );
    let collect = Arc::new(Collect::default());
    datafeed.subscribe(collect.clone());

    datafeed.start().await.unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while agent.seen().iter().filter(|s| s.route.starts_with("read")).count() < 2 {
        assert!(tokio::time::Instant::now() < deadline, "agent not polled");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    datafeed.stop();
    datafeed.join().await;

    assert_eq!(*collect.message_ids.lock().unwrap(), vec!["m1"]);
    let seen = agent.seen();
    let routes: Vec<&str> = seen.iter().map(|s| s.route.as_str()).collect();
    assert_eq!(&routes[..3], &["list", "create", "read:F-created"]);
    assert_eq!(seen[2].body, Some(json!({ "ackId": "" })));
    assert_eq!(seen[3].body, Some(json!({ "ackId": "A1" })));
}
