//! Real-time event model

pub mod types;

pub use types::{
    Attachment, ConnectionAccepted, ConnectionRequested, EventKind, EventPayload, Initiator,
    InstantMessageCreated, KeyValue, Message, MessageSent, MessageSuppressed, RealTimeEvent,
    RoomCreated, RoomDeactivated, RoomMemberDemotedFromOwner, RoomMemberPromotedToOwner,
    RoomMembershipChange, RoomProperties, RoomReactivated, RoomUpdated, SharedPost, Stream,
    SymphonyElementsAction, User, UserJoinedRoom, UserLeftRoom, UserRequestedToJoinRoom,
};
