//! Listener capability surface
//!
//! One async handler per event kind. Every handler has a default no-op
//! implementation, so a listener only overrides the kinds it cares about and
//! kinds added later are ignored by existing listeners.
//!
//! # Example
//!
//! ```
//! use async_trait::async_trait;
//! use botfeed_core::events::{Initiator, MessageSent};
//! use botfeed_core::{HandlerResult, RealTimeEventListener};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl RealTimeEventListener for Echo {
//!     async fn on_message_sent(&self, initiator: &Initiator, event: &MessageSent) -> HandlerResult {
//!         let text = event.message.as_ref().map(|m| m.message.as_str()).unwrap_or("");
//!         println!("{:?} said {}", initiator.username(), text);
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::ListenerError;
use crate::events::{
    ConnectionAccepted, ConnectionRequested, Initiator, InstantMessageCreated, MessageSent,
    MessageSuppressed, RealTimeEvent, RoomCreated, RoomDeactivated, RoomMemberDemotedFromOwner,
    RoomMemberPromotedToOwner, RoomReactivated, RoomUpdated, SharedPost, SymphonyElementsAction,
    UserJoinedRoom, UserLeftRoom, UserRequestedToJoinRoom,
};

/// Outcome of a single handler invocation
pub type HandlerResult = Result<(), ListenerError>;

/// Subscriber to datafeed events
///
/// Returning `Err` (or panicking) from a handler is logged by the dispatcher
/// and does not affect other listeners or the loop.
#[async_trait]
pub trait RealTimeEventListener: Send + Sync {
    /// Filter applied before any handler runs.
    ///
    /// By default events initiated by the bot itself are rejected, so a bot
    /// does not react to its own messages. With no bot identity configured
    /// every event is accepted.
    fn is_accepting_event(&self, event: &RealTimeEvent, bot_username: Option<&str>) -> bool {
        match (bot_username, event.initiator.username()) {
            (Some(bot), Some(initiator)) => bot != initiator,
            _ => true,
        }
    }

    // ─── Event Handlers (default no-ops) ─────────────────────────────

    /// A message was posted in an IM, MIM or room
    async fn on_message_sent(&self, _initiator: &Initiator, _event: &MessageSent) -> HandlerResult {
        Ok(())
    }

    async fn on_message_suppressed(
        &self,
        _initiator: &Initiator,
        _event: &MessageSuppressed,
    ) -> HandlerResult {
        Ok(())
    }

    /// A user submitted an interactive form
    async fn on_symphony_elements_action(
        &self,
        _initiator: &Initiator,
        _event: &SymphonyElementsAction,
    ) -> HandlerResult {
        Ok(())
    }

    async fn on_shared_post(&self, _initiator: &Initiator, _event: &SharedPost) -> HandlerResult {
        Ok(())
    }

    async fn on_instant_message_created(
        &self,
        _initiator: &Initiator,
        _event: &InstantMessageCreated,
    ) -> HandlerResult {
        Ok(())
    }

    async fn on_room_created(&self, _initiator: &Initiator, _event: &RoomCreated) -> HandlerResult {
        Ok(())
    }

    async fn on_room_updated(&self, _initiator: &Initiator, _event: &RoomUpdated) -> HandlerResult {
        Ok(())
    }

    async fn on_room_deactivated(
        &self,
        _initiator: &Initiator,
        _event: &RoomDeactivated,
    ) -> HandlerResult {
        Ok(())
    }

    async fn on_room_reactivated(
        &self,
        _initiator: &Initiator,
        _event: &RoomReactivated,
    ) -> HandlerResult {
        Ok(())
    }

    async fn on_user_joined_room(
        &self,
        _initiator: &Initiator,
        _event: &UserJoinedRoom,
    ) -> HandlerResult {
        Ok(())
    }

    async fn on_user_left_room(&self, _initiator: &Initiator, _event: &UserLeftRoom) -> HandlerResult {
        Ok(())
    }

    async fn on_room_member_promoted_to_owner(
        &self,
        _initiator: &Initiator,
        _event: &RoomMemberPromotedToOwner,
    ) -> HandlerResult {
        Ok(())
    }

    async fn on_room_member_demoted_from_owner(
        &self,
        _initiator: &Initiator,
        _event: &RoomMemberDemotedFromOwner,
    ) -> HandlerResult {
        Ok(())
    }

    async fn on_connection_requested(
        &self,
        _initiator: &Initiator,
        _event: &ConnectionRequested,
    ) -> HandlerResult {
        Ok(())
    }

    async fn on_connection_accepted(
        &self,
        _initiator: &Initiator,
        _event: &ConnectionAccepted,
    ) -> HandlerResult {
        Ok(())
    }

    async fn on_user_requested_to_join_room(
        &self,
        _initiator: &Initiator,
        _event: &UserRequestedToJoinRoom,
    ) -> HandlerResult {
        Ok(())
    }
}
