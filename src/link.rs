//! Broker link module
//!
//! Owns the single shared broker session: connection lifecycle
//! (connect / reconnect-with-backoff / disconnect), the retained liveness
//! announcement with its last-will counterpart, wire-level subscription
//! replay, and serialized outbound publishing.

pub mod config;
pub mod error;
pub mod manager;
pub mod state;

pub use config::LinkConfig;
pub use error::LinkError;
pub use manager::{BrokerLink, PublishOptions};
pub use state::{LinkState, Transition};
