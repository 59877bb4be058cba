//! Link lifecycle states and the observable transition record.

use std::fmt;

/// Lifecycle state of the broker link.
///
/// `Disconnected → Connecting → Connected → Reconnecting → …`; the link
/// parks in `Disconnected` only on explicit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
	/// No session and none being established.
	Disconnected,
	/// First session attempt in flight.
	Connecting,
	/// Live session; publishes are accepted.
	Connected,
	/// Session lost or attempt failed; retrying on a fixed interval.
	Reconnecting,
}

impl LinkState {
	/// True only while a live session is up.
	pub fn is_connected(&self) -> bool {
		matches!(self, LinkState::Connected)
	}
}

impl fmt::Display for LinkState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			| LinkState::Disconnected => "disconnected",
			| LinkState::Connecting => "connecting",
			| LinkState::Connected => "connected",
			| LinkState::Reconnecting => "reconnecting",
		};
		write!(f, "{name}")
	}
}

/// One observed state change, pushed to the link's transition log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
	/// State before the change.
	pub from: LinkState,
	/// State after the change.
	pub to: LinkState,
}

impl fmt::Display for Transition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} -> {}", self.from, self.to)
	}
}
