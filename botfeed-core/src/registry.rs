//! Listener registry
//!
//! Subscribers are shared with the caller through `Arc` and kept in
//! registration order. Dispatch never iterates the live set: it works on a
//! snapshot, so subscribe/unsubscribe from another task (or from inside a
//! handler) cannot disturb a batch that is being delivered.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::listener::RealTimeEventListener;

/// Shared handle to a subscribed listener
pub type ListenerRef = Arc<dyn RealTimeEventListener>;

/// Ordered set of subscribed listeners
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<ListenerRef>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener at the end of the dispatch order.
    ///
    /// Returns `false` if this exact listener is already subscribed.
    pub fn subscribe(&self, listener: ListenerRef) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            debug!("Listener already subscribed, ignoring");
            return false;
        }
        listeners.push(listener);
        debug!(count = listeners.len(), "Listener subscribed");
        true
    }

    /// Remove a listener by identity. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, listener: &ListenerRef) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        let removed = listeners.len() != before;
        if removed {
            debug!(count = listeners.len(), "Listener unsubscribed");
        }
        removed
    }

    /// Copy of the current listener set, in registration order
    pub fn snapshot(&self) -> Vec<ListenerRef> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}
