//! Listener used by `botfeed run`: logs every event and enforces `--max-events`.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use botfeed_core::events::{
    ConnectionAccepted, ConnectionRequested, EventKind, Initiator, InstantMessageCreated,
    MessageSent, MessageSuppressed, RoomCreated, RoomDeactivated, RoomMemberDemotedFromOwner,
    RoomMemberPromotedToOwner, RoomReactivated, RoomUpdated, SharedPost, Stream,
    SymphonyElementsAction, UserJoinedRoom, UserLeftRoom, UserRequestedToJoinRoom,
};
use botfeed_core::{HandlerResult, RealTimeEventListener, StopHandle};
use tracing::{debug, info};

pub struct LoggingListener {
    stop: StopHandle,
    max_events: Option<u64>,
    handled: AtomicU64,
}

impl LoggingListener {
    pub fn new(stop: StopHandle, max_events: Option<u64>) -> Self {
        Self {
            stop,
            max_events,
            handled: AtomicU64::new(0),
        }
    }

    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::SeqCst)
    }

    fn record(&self, kind: EventKind, initiator: &Initiator, stream: Option<&Stream>) -> HandlerResult {
        let handled = self.handled.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            kind = %kind,
            initiator = initiator.username().unwrap_or("-"),
            stream = stream.map(|s| s.stream_id.as_str()).unwrap_or("-"),
            "Event"
        );

        if let Some(max) = self.max_events
            && handled >= max
        {
            info!(handled, "Event limit reached");
            self.stop.stop();
        }
        Ok(())
    }
}

#[async_trait]
impl RealTimeEventListener for LoggingListener {
    async fn on_message_sent(&self, initiator: &Initiator, event: &MessageSent) -> HandlerResult {
        if let Some(message) = &event.message {
            debug!(message_id = %message.message_id, text = %message.message, "Message");
        }
        let stream = event.message.as_ref().and_then(|m| m.stream.as_ref());
        self.record(EventKind::MessageSent, initiator, stream)
    }

    async fn on_message_suppressed(
        &self,
        initiator: &Initiator,
        event: &MessageSuppressed,
    ) -> HandlerResult {
        self.record(EventKind::MessageSuppressed, initiator, event.stream.as_ref())
    }

    async fn on_symphony_elements_action(
        &self,
        initiator: &Initiator,
        event: &SymphonyElementsAction,
    ) -> HandlerResult {
        debug!(form_id = ?event.form_id, values = %event.form_values, "Form submitted");
        self.record(EventKind::SymphonyElementsAction, initiator, event.stream.as_ref())
    }

    async fn on_shared_post(&self, initiator: &Initiator, event: &SharedPost) -> HandlerResult {
        let stream = event.message.as_ref().and_then(|m| m.stream.as_ref());
        self.record(EventKind::SharedPost, initiator, stream)
    }

    async fn on_instant_message_created(
        &self,
        initiator: &Initiator,
        event: &InstantMessageCreated,
    ) -> HandlerResult {
        self.record(EventKind::InstantMessageCreated, initiator, event.stream.as_ref())
    }

    async fn on_room_created(&self, initiator: &Initiator, event: &RoomCreated) -> HandlerResult {
        self.record(EventKind::RoomCreated, initiator, event.stream.as_ref())
    }

    async fn on_room_updated(&self, initiator: &Initiator, event: &RoomUpdated) -> HandlerResult {
        self.record(EventKind::RoomUpdated, initiator, event.stream.as_ref())
    }

    async fn on_room_deactivated(
        &self,
        initiator: &Initiator,
        event: &RoomDeactivated,
    ) -> HandlerResult {
        self.record(EventKind::RoomDeactivated, initiator, event.stream.as_ref())
    }

    async fn on_room_reactivated(
        &self,
        initiator: &Initiator,
        event: &RoomReactivated,
    ) -> HandlerResult {
        self.record(EventKind::RoomReactivated, initiator, event.stream.as_ref())
    }

    async fn on_user_joined_room(
        &self,
        initiator: &Initiator,
        event: &UserJoinedRoom,
    ) -> HandlerResult {
        self.record(EventKind::UserJoinedRoom, initiator, event.stream.as_ref())
    }

    async fn on_user_left_room(&self, initiator: &Initiator, event: &UserLeftRoom) -> HandlerResult {
        self.record(EventKind::UserLeftRoom, initiator, event.stream.as_ref())
    }

    async fn on_room_member_promoted_to_owner(
        &self,
        initiator: &Initiator,
        event: &RoomMemberPromotedToOwner,
    ) -> HandlerResult {
        self.record(EventKind::RoomMemberPromotedToOwner, initiator, event.stream.as_ref())
    }

    async fn on_room_member_demoted_from_owner(
        &self,
        initiator: &Initiator,
        event: &RoomMemberDemotedFromOwner,
    ) -> HandlerResult {
        self.record(EventKind::RoomMemberDemotedFromOwner, initiator, event.stream.as_ref())
    }

    async fn on_connection_requested(
        &self,
        initiator: &Initiator,
        _event: &ConnectionRequested,
    ) -> HandlerResult {
        self.record(EventKind::ConnectionRequested, initiator, None)
    }

    async fn on_connection_accepted(
        &self,
        initiator: &Initiator,
        _event: &ConnectionAccepted,
    ) -> HandlerResult {
        self.record(EventKind::ConnectionAccepted, initiator, None)
    }

    async fn on_user_requested_to_join_room(
        &self,
        initiator: &Initiator,
        event: &UserRequestedToJoinRoom,
    ) -> HandlerResult {
        self.record(EventKind::UserRequestedToJoinRoom, initiator, event.stream.as_ref())
    }
}
