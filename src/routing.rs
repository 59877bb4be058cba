//! Message routing: the shared pattern table plus channel-based fan-out.
//!
//! [`MessageRouter`] is the process-wide subscription table (read-mostly,
//! exclusive writes); [`Subscription`] is the consumer-side handle.

pub mod dispatcher;
pub mod subscription;

pub use dispatcher::MessageRouter;
pub use subscription::Subscription;
