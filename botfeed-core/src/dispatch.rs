//! Event dispatch to listeners
//!
//! Delivery is sequential and isolated per listener: every listener sees the
//! event in registration order, and an error or panic in one handler is
//! logged without affecting the others.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::{error, trace};

use crate::events::{EventPayload, RealTimeEvent};
use crate::listener::{HandlerResult, RealTimeEventListener};
use crate::registry::ListenerRef;

/// Per-event delivery counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Handlers that ran to completion
    pub delivered: usize,
    /// Listeners whose acceptance filter rejected the event
    pub skipped: usize,
    /// Listeners whose filter or handler returned an error or panicked
    pub failed: usize,
}

impl DispatchOutcome {
    fn merge(&mut self, other: DispatchOutcome) {
        self.delivered += other.delivered;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Routes events to the matching handler of each listener
#[derive(Debug, Clone, Default)]
pub struct EventDispatcher {
    bot_username: Option<String>,
}

impl EventDispatcher {
    /// `bot_username` is handed to each listener's acceptance filter.
    pub fn new(bot_username: Option<String>) -> Self {
        Self { bot_username }
    }

    /// Deliver one event to every listener, in order.
    pub async fn dispatch(
        &self,
        event: &RealTimeEvent,
        listeners: &[ListenerRef],
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let kind = event.kind();

        for (index, listener) in listeners.iter().enumerate() {
            let bot_username = self.bot_username.as_deref();
            let result = AssertUnwindSafe(async {
                if !listener.is_accepting_event(event, bot_username) {
                    return None;
                }
                Some(deliver(listener.as_ref(), event).await)
            })
            .catch_unwind()
            .await;

            match result {
                Ok(None) => {
                    trace!(listener = index, kind = %kind, "Listener not accepting event");
                    outcome.skipped += 1;
                }
                Ok(Some(Ok(()))) => outcome.delivered += 1,
                Ok(Some(Err(e))) => {
                    error!(listener = index, kind = %kind, error = %e, "Listener handler error");
                    outcome.failed += 1;
                }
                Err(_) => {
                    error!(listener = index, kind = %kind, "Listener panicked");
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }

    /// Deliver a batch: each event reaches all listeners before the next starts.
    pub async fn dispatch_all(
        &self,
        events: &[RealTimeEvent],
        listeners: &[ListenerRef],
    ) -> DispatchOutcome {
        let mut total = DispatchOutcome::default();
        for event in events {
            total.merge(self.dispatch(event, listeners).await);
        }
        total
    }
}

async fn deliver(listener: &dyn RealTimeEventListener, event: &RealTimeEvent) -> HandlerResult {
    let initiator = &event.initiator;
    match &event.payload {
        EventPayload::MessageSent(p) => listener.on_message_sent(initiator, p).await,
        EventPayload::MessageSuppressed(p) => listener.on_message_suppressed(initiator, p).await,
        EventPayload::SymphonyElementsAction(p) => {
            listener.on_symphony_elements_action(initiator, p).await
        }
        EventPayload::SharedPost(p) => listener.on_shared_post(initiator, p).await,
        EventPayload::InstantMessageCreated(p) => {
            listener.on_instant_message_created(initiator, p).await
        }
        EventPayload::RoomCreated(p) => listener.on_room_created(initiator, p).await,
        EventPayload::RoomUpdated(p) => listener.on_room_updated(initiator, p).await,
        EventPayload::RoomDeactivated(p) => listener.on_room_deactivated(initiator, p).await,
        EventPayload::RoomReactivated(p) => listener.on_room_reactivated(initiator, p).await,
        EventPayload::UserJoinedRoom(p) => listener.on_user_joined_room(initiator, p).await,
        EventPayload::UserLeftRoom(p) => listener.on_user_left_room(initiator, p).await,
        EventPayload::RoomMemberPromotedToOwner(p) => {
            listener.on_room_member_promoted_to_owner(initiator, p).await
        }
        EventPayload::RoomMemberDemotedFromOwner(p) => {
            listener.on_room_member_demoted_from_owner(initiator, p).await
        }
        EventPayload::ConnectionRequested(p) => listener.on_connection_requested(initiator, p).await,
        EventPayload::ConnectionAccepted(p) => listener.on_connection_accepted(initiator, p).await,
        EventPayload::UserRequestedToJoinRoom(p) => {
            listener.on_user_requested_to_join_room(initiator, p).await
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::error::ListenerError;
    use crate::events::{
        ConnectionRequested, Initiator, MessageSent, RoomCreated, RoomMembershipChange, User,
    };

    /// Records "<name>:<kind>" for every handler call it receives
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn push(&self, kind: &str) {
            self.log.lock().unwrap().push(format!("{}:{kind}", self.name));
        }
    }

    #[async_trait]
    impl RealTimeEventListener for Recorder {
        async fn on_message_sent(&self, _: &Initiator, _: &MessageSent) -> HandlerResult {
            self.push("message_sent");
            Ok(())
        }

        async fn on_room_created(&self, _: &Initiator, _: &RoomCreated) -> HandlerResult {
            self.push("room_created");
            Ok(())
        }

        async fn on_user_joined_room(
            &self,
            _: &Initiator,
            _: &RoomMembershipChange,
        ) -> HandlerResult {
            self.push("user_joined_room");
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl RealTimeEventListener for Failing {
        async fn on_message_sent(&self, _: &Initiator, _: &MessageSent) -> HandlerResult {
            Err(ListenerError::failed("boom"))
        }
    }

    struct Panicking;

    #[async_trait]
    impl RealTimeEventListener for Panicking {
        async fn on_message_sent(&self, _: &Initiator, _: &MessageSent) -> HandlerResult {
            panic!("listener bug");
        }
    }

    struct PanickingFilter;

    #[async_trait]
    impl RealTimeEventListener for PanickingFilter {
        fn is_accepting_event(&self, _: &RealTimeEvent, _: Option<&str>) -> bool {
            panic!("filter bug");
        }
    }

    fn event(payload: EventPayload) -> RealTimeEvent {
        RealTimeEvent::new(Initiator::user(User::with_username("alice")), payload)
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> ListenerRef {
        Arc::new(Recorder {
            name,
            log: Arc::clone(log),
        })
    }

    #[tokio::test]
    async fn dispatch_routes_to_matching_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let listeners = vec![recorder("a", &log)];
        let dispatcher = EventDispatcher::default();

        dispatcher
            .dispatch(&event(EventPayload::RoomCreated(RoomCreated::default())), &listeners)
            .await;
        dispatcher
            .dispatch(
                &event(EventPayload::UserJoinedRoom(RoomMembershipChange::default())),
                &listeners,
            )
            .await;

        assert_eq!(*log.lock().unwrap(), vec!["a:room_created", "a:user_joined_room"]);
    }

    #[tokio::test]
    async fn dispatch_unhandled_kind_is_no_op() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let listeners = vec![recorder("a", &log)];

        let outcome = EventDispatcher::default()
            .dispatch(
                &event(EventPayload::ConnectionRequested(ConnectionRequested::default())),
                &listeners,
            )
            .await;

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.failed, 0);
    }

    #[tokio::test]
    async fn dispatch_all_is_sequential_per_event() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let listeners = vec![recorder("a", &log), recorder("b", &log)];
        let events = vec![
            event(EventPayload::MessageSent(MessageSent::default())),
            event(EventPayload::RoomCreated(RoomCreated::default())),
        ];

        let outcome = EventDispatcher::default()
            .dispatch_all(&events, &listeners)
            .await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:message_sent",
                "b:message_sent",
                "a:room_created",
                "b:room_created"
            ]
        );
        assert_eq!(outcome.delivered, 4);
    }

    #[tokio::test]
    async fn handler_error_does_not_stop_other_listeners() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let listeners: Vec<ListenerRef> = vec![Arc::new(Failing), recorder("b", &log)];

        let outcome = EventDispatcher::default()
            .dispatch(&event(EventPayload::MessageSent(MessageSent::default())), &listeners)
            .await;

        assert_eq!(*log.lock().unwrap(), vec!["b:message_sent"]);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.delivered, 1);
    }

    #[tokio::test]
    async fn handler_panic_is_contained() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let listeners: Vec<ListenerRef> = vec![Arc::new(Panicking), recorder("b", &log)];
        let events = vec![
            event(EventPayload::MessageSent(MessageSent::default())),
            event(EventPayload::RoomCreated(RoomCreated::default())),
        ];

        let outcome = EventDispatcher::default()
            .dispatch_all(&events, &listeners)
            .await;

        assert_eq!(*log.lock().unwrap(), vec!["b:message_sent", "b:room_created"]);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.delivered, 3);
    }

    #[tokio::test]
    async fn own_events_are_skipped_when_identity_known() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let listeners = vec![recorder("a", &log)];
        let dispatcher = EventDispatcher::new(Some("alice".to_string()));

        let outcome = dispatcher
            .dispatch(&event(EventPayload::MessageSent(MessageSent::default())), &listeners)
            .await;

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(outcome.skipped, 1);
    }

    #[tokio::test]
    async fn filter_panic_is_contained() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let listeners: Vec<ListenerRef> = vec![Arc::new(PanickingFilter), recorder("b", &log)];
        let events = vec![
            event(EventPayload::MessageSent(MessageSent::default())),
            event(EventPayload::RoomCreated(RoomCreated::default())),
        ];

        let outcome = EventDispatcher::default()
            .dispatch_all(&events, &listeners)
            .await;

        assert_eq!(*log.lock().unwrap(), vec!["b:message_sent", "b:room_created"]);
        assert_eq!(outcome.failed, 2);
        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.skipped, 0);
    }
}
