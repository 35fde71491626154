//! Datafeed polling loop for chat bots.
//!
//! This crate keeps a bot connected to the agent's real-time datafeed: it
//! obtains a feed, long-polls it with an acknowledgement cursor, and fans each
//! batch of typed events out to subscribed listeners. Stale feeds are
//! recreated, rejected sessions refreshed and transient failures retried with
//! exponential backoff.
//!
//! # Key Types
//!
//! - [`DatafeedLoop`] - Owns the cursor and drives read → dispatch → commit
//! - [`RealTimeEventListener`] - One async handler per event kind, all optional
//! - [`DatafeedTransport`] - Seam over the agent's datafeed endpoints
//! - [`AuthSession`] - Supplies and refreshes session credentials
//! - [`InMemoryDatafeed`] - Simulated datafeed server for tests

pub mod auth;
pub mod config;
pub mod datafeed;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod listener;
pub mod memory;
pub mod registry;
pub mod retry;
pub mod transport;

// Re-exports
pub use auth::{AuthSession, AuthTokens, StaticAuthSession};
pub use config::{DatafeedConfig, RetryConfig};
pub use datafeed::{DatafeedLoop, FeedPosition, LoopStatus, StopHandle};
pub use dispatch::{DispatchOutcome, EventDispatcher};
pub use error::{AuthError, Error, ListenerError, Result, TransportError};
pub use events::{EventKind, EventPayload, RealTimeEvent};
pub use lifecycle::FeedLifecycle;
pub use listener::{HandlerResult, RealTimeEventListener};
pub use memory::InMemoryDatafeed;
pub use registry::{ListenerRef, ListenerRegistry};
pub use retry::Backoff;
pub use transport::{AckId, DatafeedTransport, Feed, ReadResult};
