//! In-process broker and its transport.
//!
//! Implements just enough broker behavior for the distribution core to be
//! driven hermetically: wire-level wildcard matching, retained messages,
//! last-will delivery on unclean disconnect, and test controls for taking
//! the broker offline or severing live sessions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arcstr::ArcStr;
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::QoS;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{
	ConnectOptions, ConnectionError, LastWill, Message, Session,
	SessionEvent, Transport,
};
use crate::topic::{TopicPath, TopicPattern};

/// Shared in-process broker. Cheap to clone; all clones address the same
/// broker state.
#[derive(Clone, Default)]
pub struct MemoryBroker {
	inner: Arc<Mutex<BrokerInner>>,
}

struct BrokerInner {
	online: bool,
	next_id: u64,
	sessions: HashMap<u64, SessionSlot>,
	retained: HashMap<ArcStr, Message>,
}

impl Default for BrokerInner {
	fn default() -> Self {
		Self {
			online: true,
			next_id: 0,
			sessions: HashMap::new(),
			retained: HashMap::new(),
		}
	}
}

struct SessionSlot {
	client_id: ArcStr,
	events: mpsc::UnboundedSender<SessionEvent>,
	subscriptions: Vec<TopicPattern>,
	last_will: Option<LastWill>,
}

impl MemoryBroker {
	/// Creates a broker with no sessions and no retained state.
	pub fn new() -> Self {
		Self::default()
	}

	/// A transport handle connecting to this broker.
	pub fn transport(&self) -> MemoryTransport {
		MemoryTransport {
			broker: self.clone(),
		}
	}

	/// Gates new connection attempts. Established sessions are untouched;
	/// combine with [`MemoryBroker::sever_all`] to simulate an outage.
	pub fn set_online(&self, online: bool) {
		self.lock().online = online;
	}

	/// Severs every session uncleanly: each receives a `Disconnected`
	/// event and its last will (if any) is published.
	pub fn sever_all(&self) {
		let ids: Vec<u64> = self.lock().sessions.keys().copied().collect();
		for id in ids {
			self.sever_session(id);
		}
	}

	/// Severs the sessions of one client id uncleanly.
	pub fn sever_client(&self, client_id: &str) {
		let ids: Vec<u64> = self
			.lock()
			.sessions
			.iter()
			.filter(|(_, slot)| slot.client_id.as_str() == client_id)
			.map(|(id, _)| *id)
			.collect();
		for id in ids {
			self.sever_session(id);
		}
	}

	/// Currently retained payload on `topic`, if any.
	pub fn retained_payload(&self, topic: &str) -> Option<Bytes> {
		self.lock().retained.get(topic).map(|m| m.payload.clone())
	}

	/// Client ids with a live session.
	pub fn connected_clients(&self) -> Vec<ArcStr> {
		self.lock()
			.sessions
			.values()
			.map(|slot| slot.client_id.clone())
			.collect()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, BrokerInner> {
		self.inner
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	fn sever_session(&self, id: u64) {
		let (slot, will) = {
			let mut inner = self.lock();
			match inner.sessions.remove(&id) {
				| Some(slot) => {
					let will = slot.last_will.clone();
					(slot, will)
				}
				| None => return,
			}
		};
		debug!(client_id = %slot.client_id, "severing broker session");
		let _ = slot.events.send(SessionEvent::Disconnected(
			ConnectionError::session_closed("connection reset by broker"),
		));
		if let Some(will) = will {
			let message =
				Message::new(will.topic.as_str(), will.payload, will.qos)
					.retain(will.retain);
			let mut inner = self.lock();
			Self::publish_locked(&mut inner, message);
		}
	}

	fn connect(
		&self,
		options: &ConnectOptions,
	) -> Result<MemorySession, ConnectionError> {
		let mut inner = self.lock();
		if !inner.online {
			return Err(ConnectionError::unavailable(
				"memory broker is offline",
			));
		}
		let id = inner.next_id;
		inner.next_id += 1;
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		inner.sessions.insert(
			id,
			SessionSlot {
				client_id: options.client_id.clone(),
				events: events_tx,
				subscriptions: Vec::new(),
				last_will: options.last_will.clone(),
			},
		);
		debug!(client_id = %options.client_id, session = id, "memory broker session established");
		Ok(MemorySession {
			id,
			broker: self.clone(),
			events: events_rx,
		})
	}

	fn publish_from(
		&self,
		session: u64,
		message: Message,
	) -> Result<(), ConnectionError> {
		let mut inner = self.lock();
		if !inner.sessions.contains_key(&session) {
			return Err(ConnectionError::session_closed(
				"publish on severed session",
			));
		}
		Self::publish_locked(&mut inner, message);
		Ok(())
	}

	fn publish_locked(inner: &mut BrokerInner, message: Message) {
		if message.retain {
			if message.payload.is_empty() {
				inner.retained.remove(&message.topic.path());
			} else {
				inner
					.retained
					.insert(message.topic.path(), message.clone());
			}
		}
		for slot in inner.sessions.values() {
			let matched = slot
				.subscriptions
				.iter()
				.any(|pattern| pattern.matches(&message.topic));
			if matched {
				trace!(
					client_id = %slot.client_id,
					topic = %message.topic,
					"delivering message"
				);
				let _ = slot
					.events
					.send(SessionEvent::Message(message.clone()));
			}
		}
	}

	fn subscribe(
		&self,
		session: u64,
		pattern: &str,
		_qos: QoS,
	) -> Result<(), ConnectionError> {
		let pattern = TopicPattern::parse(pattern)
			.map_err(|err| ConnectionError::rejected(err.to_string()))?;
		let mut inner = self.lock();

		// retained messages matching the new subscription are replayed
		let replay: Vec<Message> = inner
			.retained
			.values()
			.filter(|m| pattern.matches(&m.topic))
			.cloned()
			.collect();

		let slot = inner.sessions.get_mut(&session).ok_or_else(|| {
			ConnectionError::session_closed("subscribe on severed session")
		})?;
		slot.subscriptions.push(pattern);
		for message in replay {
			let _ = slot.events.send(SessionEvent::Message(message));
		}
		Ok(())
	}

	fn close(&self, session: u64) {
		// clean close: no last-will delivery
		self.lock().sessions.remove(&session);
	}
}

/// Transport handle for a [`MemoryBroker`].
#[derive(Clone)]
pub struct MemoryTransport {
	broker: MemoryBroker,
}

#[async_trait]
impl Transport for MemoryTransport {
	async fn connect(
		&self,
		options: &ConnectOptions,
	) -> Result<Box<dyn Session>, ConnectionError> {
		let session = self.broker.connect(options)?;
		Ok(Box::new(session))
	}
}

/// One live session against a [`MemoryBroker`].
pub struct MemorySession {
	id: u64,
	broker: MemoryBroker,
	events: mpsc::UnboundedReceiver<SessionEvent>,
}

#[async_trait]
impl Session for MemorySession {
	async fn publish(
		&mut self,
		message: Message,
	) -> Result<(), ConnectionError> {
		self.broker.publish_from(self.id, message)
	}

	async fn subscribe(
		&mut self,
		pattern: &str,
		qos: QoS,
	) -> Result<(), ConnectionError> {
		self.broker.subscribe(self.id, pattern, qos)
	}

	async fn next_event(&mut self) -> SessionEvent {
		match self.events.recv().await {
			| Some(event) => event,
			| None => SessionEvent::Disconnected(
				ConnectionError::session_closed("event channel closed"),
			),
		}
	}

	async fn close(&mut self) -> Result<(), ConnectionError> {
		self.broker.close(self.id);
		Ok(())
	}
}
