//! Transport abstraction between the broker link and a concrete broker.
//!
//! The link state machine is written against [`Transport`]/[`Session`] so
//! the same lifecycle code runs over a real MQTT broker
//! ([`rumqtt::RumqttTransport`]) or the in-process broker
//! ([`memory::MemoryBroker`]) used by tests and demos.

use std::time::Duration;

use arcstr::ArcStr;
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::QoS;
use thiserror::Error;

use crate::topic::TopicPath;

pub mod memory;
pub mod rumqtt;

/// A single broker message, in either direction.
#[derive(Debug, Clone)]
pub struct Message {
	/// Concrete topic the message was published to.
	pub topic: TopicPath,
	/// Raw payload bytes.
	pub payload: Bytes,
	/// Broker-retained flag.
	pub retain: bool,
	/// Transport delivery guarantee.
	pub qos: QoS,
}

impl Message {
	/// Creates a non-retained message with the given QoS.
	pub fn new(
		topic: impl Into<TopicPath>,
		payload: impl Into<Bytes>,
		qos: QoS,
	) -> Self {
		Self {
			topic: topic.into(),
			payload: payload.into(),
			retain: false,
			qos,
		}
	}

	/// Sets the retain flag.
	pub fn retain(mut self, retain: bool) -> Self {
		self.retain = retain;
		self
	}
}

/// Message the broker publishes on the client's behalf after an unclean
/// disconnect.
#[derive(Debug, Clone)]
pub struct LastWill {
	/// Topic the will is published to.
	pub topic: ArcStr,
	/// Will payload.
	pub payload: Bytes,
	/// Delivery guarantee for the will.
	pub qos: QoS,
	/// Whether the broker retains the will message.
	pub retain: bool,
}

/// Parameters for establishing one broker session.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
	/// Client identifier presented to the broker.
	pub client_id: ArcStr,
	/// Transport keepalive interval.
	pub keep_alive: Duration,
	/// Whether the broker should discard prior session state.
	pub clean_session: bool,
	/// Optional last-will registration.
	pub last_will: Option<LastWill>,
}

impl ConnectOptions {
	/// Options with the transport defaults and no last will.
	pub fn new(client_id: impl Into<ArcStr>) -> Self {
		Self {
			client_id: client_id.into(),
			keep_alive: Duration::from_secs(60),
			clean_session: true,
			last_will: None,
		}
	}
}

/// Transport-level failures. Always recoverable: the link answers every
/// one of these with its reconnect policy, never by crashing.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
	/// Broker is unreachable or refused the network connection.
	#[error("broker unavailable: {details}")]
	Unavailable {
		/// Transport-specific description.
		details: String,
	},

	/// Broker accepted the connection but rejected the session.
	#[error("broker rejected session: {reason}")]
	Rejected {
		/// Broker-reported reason.
		reason: String,
	},

	/// Connection attempt did not complete in time.
	#[error("connection attempt timed out after {timeout:?}")]
	Timeout {
		/// The elapsed limit.
		timeout: Duration,
	},

	/// An established session ended.
	#[error("session closed: {details}")]
	SessionClosed {
		/// Transport-specific description.
		details: String,
	},
}

impl ConnectionError {
	/// Creates a new Unavailable error.
	pub fn unavailable(details: impl Into<String>) -> Self {
		Self::Unavailable {
			details: details.into(),
		}
	}

	/// Creates a new Rejected error.
	pub fn rejected(reason: impl Into<String>) -> Self {
		Self::Rejected {
			reason: reason.into(),
		}
	}

	/// Creates a new SessionClosed error.
	pub fn session_closed(details: impl Into<String>) -> Self {
		Self::SessionClosed {
			details: details.into(),
		}
	}
}

/// What an established session can report next.
#[derive(Debug)]
pub enum SessionEvent {
	/// An inbound publish addressed to one of this session's
	/// subscriptions.
	Message(Message),
	/// The session ended; the link decides whether to reconnect.
	Disconnected(ConnectionError),
}

/// Factory for broker sessions.
///
/// One `connect` call corresponds to one session; reconnecting means
/// asking the transport for a fresh session.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
	/// Establishes a session, registering the last will if configured.
	async fn connect(
		&self,
		options: &ConnectOptions,
	) -> Result<Box<dyn Session>, ConnectionError>;
}

/// One established broker session.
#[async_trait]
pub trait Session: Send {
	/// Sends one publish over the session.
	async fn publish(&mut self, message: Message)
	-> Result<(), ConnectionError>;

	/// Registers a wire-level subscription for `pattern`.
	async fn subscribe(
		&mut self,
		pattern: &str,
		qos: QoS,
	) -> Result<(), ConnectionError>;

	/// Waits for the next session event.
	///
	/// Must be cancel-safe: the link polls this inside a `select!` loop.
	async fn next_event(&mut self) -> SessionEvent;

	/// Closes the session cleanly (suppressing the last will).
	async fn close(&mut self) -> Result<(), ConnectionError>;
}
