//! Agent REST binding for botfeed.
//!
//! [`AgentClient`] implements [`botfeed_core::DatafeedTransport`] over the
//! agent's `v5` datafeed endpoints, decoding V4 events into the typed model
//! of `botfeed-core`.

pub mod client;
pub mod config;
pub mod error;
mod wire;

// Re-exports
pub use client::AgentClient;
pub use config::AgentConfig;
pub use error::AgentError;
