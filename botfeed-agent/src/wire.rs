//! Agent V4 event wire format
//!
//! ```json
//! {
//!   "id": "Hbv6dy",
//!   "timestamp": 1700000000000,
//!   "type": "MESSAGESENT",
//!   "initiator": { "user": { "userId": 7, "username": "alice" } },
//!   "payload": { "messageSent": { "message": { "messageId": "m1" } } }
//! }
//! ```
//!
//! Events are decoded one at a time so a single unknown or malformed event
//! is skipped instead of failing the whole batch.

use botfeed_core::events::{EventKind, EventPayload, Initiator, RealTimeEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Body of a datafeed read request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReadRequest<'a> {
    pub ack_id: &'a str,
}

/// Body of a datafeed read response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReadResponse {
    #[serde(default)]
    pub events: Option<Vec<Value>>,
    #[serde(default)]
    pub ack_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct V4Event {
    id: Option<String>,
    timestamp: Option<i64>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    initiator: Initiator,
    payload: Option<Value>,
}

#[derive(Debug, Error)]
enum SkipReason {
    #[error("malformed event: {0}")]
    Malformed(serde_json::Error),

    #[error("missing event type")]
    MissingType,

    #[error("unknown event type {0}")]
    UnknownType(String),

    #[error("missing {0} payload")]
    MissingPayload(&'static str),

    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: EventKind,
        source: serde_json::Error,
    },
}

/// Key under `payload` holding the body for `kind`
fn payload_field(kind: EventKind) -> &'static str {
    match kind {
        EventKind::MessageSent => "messageSent",
        EventKind::MessageSuppressed => "messageSuppressed",
        EventKind::SymphonyElementsAction => "symphonyElementsAction",
        EventKind::SharedPost => "sharedPost",
        EventKind::InstantMessageCreated => "instantMessageCreated",
        EventKind::RoomCreated => "roomCreated",
        EventKind::RoomUpdated => "roomUpdated",
        EventKind::RoomDeactivated => "roomDeactivated",
        EventKind::RoomReactivated => "roomReactivated",
        EventKind::UserJoinedRoom => "userJoinedRoom",
        EventKind::UserLeftRoom => "userLeftRoom",
        EventKind::RoomMemberPromotedToOwner => "roomMemberPromotedToOwner",
        EventKind::RoomMemberDemotedFromOwner => "roomMemberDemotedFromOwner",
        EventKind::ConnectionRequested => "connectionRequested",
        EventKind::ConnectionAccepted => "connectionAccepted",
        EventKind::UserRequestedToJoinRoom => "userRequestedToJoinRoom",
    }
}

fn decode_payload(kind: EventKind, body: Value) -> Result<EventPayload, serde_json::Error> {
    use serde_json::from_value as de;

    Ok(match kind {
        EventKind::MessageSent => EventPayload::MessageSent(de(body)?),
        EventKind::MessageSuppressed => EventPayload::MessageSuppressed(de(body)?),
        EventKind::SymphonyElementsAction => EventPayload::SymphonyElementsAction(de(body)?),
        EventKind::SharedPost => EventPayload::SharedPost(de(body)?),
        EventKind::InstantMessageCreated => EventPayload::InstantMessageCreated(de(body)?),
        EventKind::RoomCreated => EventPayload::RoomCreated(de(body)?),
        EventKind::RoomUpdated => EventPayload::RoomUpdated(de(body)?),
        EventKind::RoomDeactivated => EventPayload::RoomDeactivated(de(body)?),
        EventKind::RoomReactivated => EventPayload::RoomReactivated(de(body)?),
        EventKind::UserJoinedRoom => EventPayload::UserJoinedRoom(de(body)?),
        EventKind::UserLeftRoom => EventPayload::UserLeftRoom(de(body)?),
        EventKind::RoomMemberPromotedToOwner => EventPayload::RoomMemberPromotedToOwner(de(body)?),
        EventKind::RoomMemberDemotedFromOwner => {
            EventPayload::RoomMemberDemotedFromOwner(de(body)?)
        }
        EventKind::ConnectionRequested => EventPayload::ConnectionRequested(de(body)?),
        EventKind::ConnectionAccepted => EventPayload::ConnectionAccepted(de(body)?),
        EventKind::UserRequestedToJoinRoom => EventPayload::UserRequestedToJoinRoom(de(body)?),
    })
}

impl V4Event {
    fn into_event(self) -> Result<RealTimeEvent, SkipReason> {
        let type_name = self.kind.ok_or(SkipReason::MissingType)?;
        let kind = EventKind::parse(&type_name).ok_or(SkipReason::UnknownType(type_name))?;

        let field = payload_field(kind);
        let body = match self.payload {
            Some(Value::Object(mut fields)) => fields.remove(field),
            _ => None,
        }
        .ok_or(SkipReason::MissingPayload(field))?;

        let payload =
            decode_payload(kind, body).map_err(|source| SkipReason::InvalidPayload { kind, source })?;

        let mut event = RealTimeEvent::new(self.initiator, payload);
        event.id = self.id;
        event.timestamp = self.timestamp;
        Ok(event)
    }
}

/// Decode a batch, dropping (and logging) events that cannot be dispatched.
pub(crate) fn decode_events(raw: Vec<Value>) -> Vec<RealTimeEvent> {
    raw.into_iter()
        .filter_map(|value| {
            let id = value.get("id").and_then(Value::as_str).map(str::to_owned);
            let decoded = serde_json::from_value::<V4Event>(value)
                .map_err(SkipReason::Malformed)
                .and_then(V4Event::into_event);
            match decoded {
                Ok(event) => Some(event),
                Err(reason) => {
                    warn!(event_id = ?id, reason = %reason, "Skipping datafeed event");
                    None
                }
            }
        })
        .collect()
}
