//! Configuration for the broker link.

use std::time::Duration;

use arcstr::ArcStr;
use bytes::Bytes;
use rumqttc::QoS;

use crate::transport::{ConnectOptions, LastWill};

/// Payload of the retained liveness message while the link is up.
pub const LIVENESS_ONLINE: &[u8] = b"online";
/// Payload of the liveness last-will (and of the clean-disconnect
/// announcement).
pub const LIVENESS_OFFLINE: &[u8] = b"offline";

/// Tunables for one [`crate::link::BrokerLink`].
#[derive(Debug, Clone)]
pub struct LinkConfig {
	/// Client identifier presented to the broker.
	pub client_id: ArcStr,
	/// Transport keepalive interval.
	pub keep_alive: Duration,
	/// Whether the broker should discard prior session state.
	pub clean_session: bool,
	/// Upper bound on a single connection attempt.
	pub connect_timeout: Duration,
	/// Fixed delay between reconnect attempts. Deliberately not
	/// exponential; one attempt is in flight at a time.
	pub reconnect_interval: Duration,
	/// Topic carrying the retained online/offline announcement and the
	/// last will.
	pub liveness_topic: ArcStr,
	/// Capacity of the actor command channel.
	pub command_capacity: usize,
	/// Per-subscriber delivery buffer.
	pub subscriber_capacity: usize,
	/// Capacity of the transition log channel.
	pub transition_capacity: usize,
}

impl LinkConfig {
	/// Defaults matching the reference deployment: 60 s keepalive, clean
	/// sessions, 4 s connect timeout, 1 s reconnect interval.
	pub fn new(client_id: impl Into<ArcStr>) -> Self {
		Self {
			client_id: client_id.into(),
			keep_alive: Duration::from_secs(60),
			clean_session: true,
			connect_timeout: Duration::from_secs(4),
			reconnect_interval: Duration::from_secs(1),
			liveness_topic: ArcStr::from("liveness"),
			command_capacity: 100,
			subscriber_capacity: 256,
			transition_capacity: 32,
		}
	}

	/// Overrides the reconnect interval.
	pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
		self.reconnect_interval = interval;
		self
	}

	/// Overrides the liveness topic.
	pub fn with_liveness_topic(mut self, topic: impl Into<ArcStr>) -> Self {
		self.liveness_topic = topic.into();
		self
	}

	/// Connection options for one session attempt, last will included.
	pub(crate) fn connect_options(&self) -> ConnectOptions {
		ConnectOptions {
			client_id: self.client_id.clone(),
			keep_alive: self.keep_alive,
			clean_session: self.clean_session,
			last_will: Some(LastWill {
				topic: self.liveness_topic.clone(),
				payload: Bytes::from_static(LIVENESS_OFFLINE),
				qos: QoS::AtLeastOnce,
				retain: true,
			}),
		}
	}
}
