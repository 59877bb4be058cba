//! Link error types.

use thiserror::Error;

use crate::topic::PatternError;

/// Errors surfaced synchronously by [`crate::link::BrokerLink`] calls.
///
/// Transport-level failures never appear here: those are absorbed by the
/// reconnect policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
	/// Publish attempted while the link is not in the `Connected` state.
	/// The caller owns any retry policy.
	#[error("cannot publish: link is not connected")]
	NotConnected,

	/// The link actor has terminated (every handle dropped or runtime
	/// shut down).
	#[error("broker link is shut down")]
	Closed,

	/// Subscription pattern failed validation.
	#[error(transparent)]
	Pattern(#[from] PatternError),
}
