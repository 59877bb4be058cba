//! Shared subscription table and fan-out.

use std::sync::{Arc, RwLock};

use arcstr::ArcStr;
use rumqttc::QoS;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::subscription::Subscription;
use crate::topic::{SubscriptionId, TopicPath, TopicPattern, TopicRouter};
use crate::transport::Message;

/// Default per-subscriber channel capacity.
const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

type SubscriberTable = TopicRouter<mpsc::Sender<Message>>;

/// Shared subscription table with non-blocking fan-out.
///
/// Routing takes a read lock and never blocks on a subscriber: a full
/// channel drops that one delivery with a diagnostic, a closed channel
/// retires the subscription. Subscribe/unsubscribe take the write lock.
///
/// The table deliberately outlives any broker session; wire-level
/// (re)subscription is the link's concern, so registered patterns survive
/// reconnects and even full disconnects.
#[derive(Clone)]
pub struct MessageRouter {
	table: Arc<RwLock<SubscriberTable>>,
	capacity: usize,
}

impl Default for MessageRouter {
	fn default() -> Self {
		Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
	}
}

impl MessageRouter {
	/// Creates an empty router with the given per-subscriber buffer.
	pub fn new(subscriber_capacity: usize) -> Self {
		Self {
			table: Arc::new(RwLock::new(TopicRouter::new())),
			capacity: subscriber_capacity.max(1),
		}
	}

	/// Registers a subscriber under `pattern`.
	///
	/// Returns the consumer handle and whether the pattern is new to the
	/// table (the link turns fresh patterns into wire subscribes).
	pub fn subscribe(
		&self,
		pattern: TopicPattern,
		qos: QoS,
	) -> (bool, Subscription) {
		let (tx, rx) = mpsc::channel(self.capacity);
		let pattern_str = pattern.pattern();
		let (fresh, id) = self.write_table().subscribe(pattern, qos, tx);
		trace!(pattern = %pattern_str, %id, fresh, "subscriber registered");
		(fresh, Subscription::new(id, pattern_str, rx, self.clone()))
	}

	/// Fans `message` out to every structurally matching subscriber.
	///
	/// Each matching subscriber is offered the message exactly once; a
	/// failing subscriber never prevents delivery to the rest.
	pub fn route(&self, message: &Message) {
		let deliveries = {
			let table = self.read_table();
			table
				.matches(&message.topic)
				.into_iter()
				.map(|(id, _, sender)| (id, sender.clone()))
				.collect::<Vec<_>>()
		};
		let mut closed = Vec::new();

		for (id, sender) in deliveries {
			match sender.try_send(message.clone()) {
				| Ok(()) => {}
				| Err(mpsc::error::TrySendError::Full(_)) => {
					warn!(
						%id,
						topic = %message.topic,
						"subscriber buffer full, dropping delivery"
					);
				}
				| Err(mpsc::error::TrySendError::Closed(_)) => {
					closed.push(id);
				}
			}
		}

		for id in closed {
			debug!(%id, "retiring closed subscriber");
			self.remove(id);
		}
	}

	/// Active patterns with the QoS to request on the wire.
	pub fn wire_subscriptions(&self) -> Vec<(ArcStr, QoS)> {
		self.read_table().wire_subscriptions()
	}

	/// Number of registered subscribers.
	pub fn subscriber_count(&self) -> usize {
		self.read_table().handler_count()
	}

	/// True when `topic` has at least one matching subscriber.
	pub fn has_match(&self, topic: &TopicPath) -> bool {
		!self.read_table().matches(topic).is_empty()
	}

	pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
		self.write_table().unsubscribe(id).is_ok()
	}

	fn read_table(
		&self,
	) -> std::sync::RwLockReadGuard<'_, SubscriberTable> {
		self.table
			.read()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	fn write_table(
		&self,
	) -> std::sync::RwLockWriteGuard<'_, SubscriberTable> {
		self.table
			.write()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}
