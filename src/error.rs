//! Crate-wide error aggregate.

use thiserror::Error;

use crate::link::LinkError;
use crate::payload::PayloadError;
use crate::simulator::SimulatorError;
use crate::store::StoreError;
use crate::topic::{PatternError, RouterError};
use crate::transport::ConnectionError;

/// Any error the telemetry core can surface to a caller.
///
/// Transport failures (`Connection`) are normally absorbed by the link's
/// reconnect policy and only appear here when a caller drives a transport
/// directly.
#[derive(Error, Debug)]
pub enum TelemetryError {
	/// Link operation failed.
	#[error(transparent)]
	Link(#[from] LinkError),

	/// Transport-level failure.
	#[error(transparent)]
	Connection(#[from] ConnectionError),

	/// Subscription pattern failed validation.
	#[error(transparent)]
	Pattern(#[from] PatternError),

	/// Pattern table operation failed.
	#[error(transparent)]
	Router(#[from] RouterError),

	/// Payload failed schema validation.
	#[error(transparent)]
	Payload(#[from] PayloadError),

	/// Simulator operation failed.
	#[error(transparent)]
	Simulator(#[from] SimulatorError),

	/// Persistence boundary failure.
	#[error(transparent)]
	Store(#[from] StoreError),
}

/// Result alias for operations that may fail with [`TelemetryError`].
pub type Result<T> = std::result::Result<T, TelemetryError>;
