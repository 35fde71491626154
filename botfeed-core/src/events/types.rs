//! Event type definitions
//!
//! Payload structs mirror the agent's V4 event schema (camelCase on the wire).
//! Every field the agent may omit is optional so that partially populated
//! events still decode.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A platform user as it appears on initiators, messages and membership events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct User {
    pub user_id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
}

impl User {
    /// Create a user known only by username
    pub fn with_username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Default::default()
        }
    }
}

/// The user or entity whose action produced an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Initiator {
    pub user: Option<User>,
}

impl Initiator {
    /// Initiator backed by the given user
    pub fn user(user: User) -> Self {
        Self { user: Some(user) }
    }

    /// Username of the acting user, if the agent supplied one
    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.username.as_deref())
    }

    /// Numeric id of the acting user
    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().and_then(|u| u.user_id)
    }
}

/// Conversation (IM, MIM or room) an event belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Stream {
    pub stream_id: String,
    pub stream_type: Option<String>,
    pub room_name: Option<String>,
    pub members: Option<Vec<User>>,
    pub external: Option<bool>,
    pub cross_pod: Option<bool>,
}

impl Stream {
    /// Stream known only by id
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            ..Default::default()
        }
    }
}

/// File attached to a message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: Option<String>,
    pub size: Option<i64>,
}

/// A chat message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Message {
    pub message_id: String,
    pub timestamp: Option<i64>,
    /// Rendered PresentationML body
    pub message: String,
    /// Structured entity data (JSON encoded string)
    pub data: Option<String>,
    pub attachments: Option<Vec<Attachment>>,
    pub user: Option<User>,
    pub stream: Option<Stream>,
    pub external_recipients: Option<bool>,
    pub user_agent: Option<String>,
    pub original_format: Option<String>,
}

/// Room keyword entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// Room attributes carried by room created/updated events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomProperties {
    pub name: Option<String>,
    pub description: Option<String>,
    pub creator_user: Option<User>,
    pub created_date: Option<i64>,
    pub external: Option<bool>,
    pub cross_pod: Option<bool>,
    pub public: Option<bool>,
    pub copy_protected: Option<bool>,
    pub read_only: Option<bool>,
    pub discoverable: Option<bool>,
    pub members_can_invite: Option<bool>,
    pub keywords: Option<Vec<KeyValue>>,
    pub can_view_history: Option<bool>,
}

// ─── Payloads ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageSent {
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageSuppressed {
    pub message_id: Option<String>,
    pub stream: Option<Stream>,
}

/// Submission of an interactive form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SymphonyElementsAction {
    pub stream: Option<Stream>,
    pub form_message_id: Option<String>,
    pub form_id: Option<String>,
    /// Field name to submitted value, plus the `action` button name
    pub form_values: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SharedPost {
    pub message: Option<Message>,
    pub shared_message: Option<Message>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstantMessageCreated {
    pub stream: Option<Stream>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomCreated {
    pub stream: Option<Stream>,
    pub room_properties: Option<RoomProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomUpdated {
    pub stream: Option<Stream>,
    pub new_room_properties: Option<RoomProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomDeactivated {
    pub stream: Option<Stream>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomReactivated {
    pub stream: Option<Stream>,
}

/// Membership change affecting a single user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomMembershipChange {
    pub stream: Option<Stream>,
    pub affected_user: Option<User>,
}

pub type UserJoinedRoom = RoomMembershipChange;
pub type UserLeftRoom = RoomMembershipChange;
pub type RoomMemberPromotedToOwner = RoomMembershipChange;
pub type RoomMemberDemotedFromOwner = RoomMembershipChange;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionRequested {
    pub to_user: Option<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionAccepted {
    pub from_user: Option<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserRequestedToJoinRoom {
    pub stream: Option<Stream>,
    pub affected_users: Option<Vec<User>>,
}

// ─── Kinds ───────────────────────────────────────────────────────────────

/// Closed set of real-time event kinds delivered by the datafeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessageSent,
    MessageSuppressed,
    SymphonyElementsAction,
    SharedPost,
    InstantMessageCreated,
    RoomCreated,
    RoomUpdated,
    RoomDeactivated,
    RoomReactivated,
    UserJoinedRoom,
    UserLeftRoom,
    RoomMemberPromotedToOwner,
    RoomMemberDemotedFromOwner,
    ConnectionRequested,
    ConnectionAccepted,
    UserRequestedToJoinRoom,
}

impl EventKind {
    pub const ALL: [EventKind; 16] = [
        Self::MessageSent,
        Self::MessageSuppressed,
        Self::SymphonyElementsAction,
        Self::SharedPost,
        Self::InstantMessageCreated,
        Self::RoomCreated,
        Self::RoomUpdated,
        Self::RoomDeactivated,
        Self::RoomReactivated,
        Self::UserJoinedRoom,
        Self::UserLeftRoom,
        Self::RoomMemberPromotedToOwner,
        Self::RoomMemberDemotedFromOwner,
        Self::ConnectionRequested,
        Self::ConnectionAccepted,
        Self::UserRequestedToJoinRoom,
    ];

    /// Wire name used in the event `type` field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageSent => "MESSAGESENT",
            Self::MessageSuppressed => "MESSAGESUPPRESSED",
            Self::SymphonyElementsAction => "SYMPHONYELEMENTSACTION",
            Self::SharedPost => "SHAREDPOST",
            Self::InstantMessageCreated => "INSTANTMESSAGECREATED",
            Self::RoomCreated => "ROOMCREATED",
            Self::RoomUpdated => "ROOMUPDATED",
            Self::RoomDeactivated => "ROOMDEACTIVATED",
            Self::RoomReactivated => "ROOMREACTIVATED",
            Self::UserJoinedRoom => "USERJOINEDROOM",
            Self::UserLeftRoom => "USERLEFTROOM",
            Self::RoomMemberPromotedToOwner => "ROOMMEMBERPROMOTEDTOOWNER",
            Self::RoomMemberDemotedFromOwner => "ROOMMEMBERDEMOTEDFROMOWNER",
            Self::ConnectionRequested => "CONNECTIONREQUESTED",
            Self::ConnectionAccepted => "CONNECTIONACCEPTED",
            Self::UserRequestedToJoinRoom => "USERREQUESTEDTOJOINROOM",
        }
    }

    /// Parse from the wire name
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific body of an event
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    MessageSent(MessageSent),
    MessageSuppressed(MessageSuppressed),
    SymphonyElementsAction(SymphonyElementsAction),
    SharedPost(SharedPost),
    InstantMessageCreated(InstantMessageCreated),
    RoomCreated(RoomCreated),
    RoomUpdated(RoomUpdated),
    RoomDeactivated(RoomDeactivated),
    RoomReactivated(RoomReactivated),
    UserJoinedRoom(UserJoinedRoom),
    UserLeftRoom(UserLeftRoom),
    RoomMemberPromotedToOwner(RoomMemberPromotedToOwner),
    RoomMemberDemotedFromOwner(RoomMemberDemotedFromOwner),
    ConnectionRequested(ConnectionRequested),
    ConnectionAccepted(ConnectionAccepted),
    UserRequestedToJoinRoom(UserRequestedToJoinRoom),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MessageSent(_) => EventKind::MessageSent,
            Self::MessageSuppressed(_) => EventKind::MessageSuppressed,
            Self::SymphonyElementsAction(_) => EventKind::SymphonyElementsAction,
            Self::SharedPost(_) => EventKind::SharedPost,
            Self::InstantMessageCreated(_) => EventKind::InstantMessageCreated,
            Self::RoomCreated(_) => EventKind::RoomCreated,
            Self::RoomUpdated(_) => EventKind::RoomUpdated,
            Self::RoomDeactivated(_) => EventKind::RoomDeactivated,
            Self::RoomReactivated(_) => EventKind::RoomReactivated,
            Self::UserJoinedRoom(_) => EventKind::UserJoinedRoom,
            Self::UserLeftRoom(_) => EventKind::UserLeftRoom,
            Self::RoomMemberPromotedToOwner(_) => EventKind::RoomMemberPromotedToOwner,
            Self::RoomMemberDemotedFromOwner(_) => EventKind::RoomMemberDemotedFromOwner,
            Self::ConnectionRequested(_) => EventKind::ConnectionRequested,
            Self::ConnectionAccepted(_) => EventKind::ConnectionAccepted,
            Self::UserRequestedToJoinRoom(_) => EventKind::UserRequestedToJoinRoom,
        }
    }

    /// Stream the event happened in, for kinds that carry one
    pub fn stream(&self) -> Option<&Stream> {
        match self {
            Self::MessageSent(p) => p.message.as_ref().and_then(|m| m.stream.as_ref()),
            Self::SharedPost(p) => p.message.as_ref().and_then(|m| m.stream.as_ref()),
            Self::MessageSuppressed(p) => p.stream.as_ref(),
            Self::SymphonyElementsAction(p) => p.stream.as_ref(),
            Self::InstantMessageCreated(p) => p.stream.as_ref(),
            Self::RoomCreated(p) => p.stream.as_ref(),
            Self::RoomUpdated(p) => p.stream.as_ref(),
            Self::RoomDeactivated(p) => p.stream.as_ref(),
            Self::RoomReactivated(p) => p.stream.as_ref(),
            Self::UserJoinedRoom(p)
            | Self::UserLeftRoom(p)
            | Self::RoomMemberPromotedToOwner(p)
            | Self::RoomMemberDemotedFromOwner(p) => p.stream.as_ref(),
            Self::UserRequestedToJoinRoom(p) => p.stream.as_ref(),
            Self::ConnectionRequested(_) | Self::ConnectionAccepted(_) => None,
        }
    }
}

/// One event read from the datafeed
///
/// The kind is derived from the payload variant, so the two cannot disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct RealTimeEvent {
    /// Server-assigned event id
    pub id: Option<String>,
    /// Milliseconds since the Unix epoch
    pub timestamp: Option<i64>,
    pub initiator: Initiator,
    pub payload: EventPayload,
}

impl RealTimeEvent {
    pub fn new(initiator: Initiator, payload: EventPayload) -> Self {
        Self {
            id: None,
            timestamp: None,
            initiator,
            payload,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Event time, if the agent supplied a valid timestamp
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(DateTime::from_timestamp_millis)
    }
}
