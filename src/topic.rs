//! Topic handling module
//!
//! Parsing of concrete topic paths, subscription patterns with MQTT-style
//! wildcards, and the pattern table that maps patterns to subscribers.

pub mod path;
pub mod pattern;
pub mod router;

#[cfg(test)]
mod router_tests;

pub use path::TopicPath;
pub use pattern::{PatternError, PatternSegment, TopicPattern};
pub use router::{RouterError, SubscriptionId, TopicRouter};
