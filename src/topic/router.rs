//! Pattern table mapping subscription patterns to handler entries.
//!
//! The router owns no delivery machinery; it only answers "which handlers
//! match this topic". Delivery lives in [`crate::routing`], wire-level
//! subscription in [`crate::link`].

use std::collections::HashMap;
use std::fmt::Display;

use arcstr::ArcStr;
use rumqttc::QoS;
use thiserror::Error;

use super::path::TopicPath;
use super::pattern::TopicPattern;

/// Errors raised by pattern table operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
	/// Subscription with the given id is not registered.
	#[error("subscription {id} not found")]
	SubscriptionNotFound {
		/// The unknown id.
		id: SubscriptionId,
	},
}

impl RouterError {
	/// Creates a new SubscriptionNotFound error.
	pub fn subscription_not_found(id: SubscriptionId) -> Self {
		Self::SubscriptionNotFound { id }
	}
}

/// Identifies one registered handler within the pattern table.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub struct SubscriptionId(u64);

impl Display for SubscriptionId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "SubscriptionId({})", self.0)
	}
}

/// One pattern plus every handler registered under it.
struct PatternEntry<T> {
	pattern: TopicPattern,
	handlers: HashMap<SubscriptionId, (QoS, T)>,
}

/// Pattern table: patterns to handler sets, with reverse id lookup.
///
/// Multiple handlers may share a pattern and patterns may overlap in what
/// they match; a handler is stored exactly once and therefore invoked at
/// most once per routed message.
pub struct TopicRouter<T> {
	entries: HashMap<ArcStr, PatternEntry<T>>,
	index: HashMap<SubscriptionId, ArcStr>,
	next_id: u64,
}

impl<T> Default for TopicRouter<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> TopicRouter<T> {
	/// Creates an empty table.
	pub fn new() -> Self {
		Self {
			entries: HashMap::new(),
			index: HashMap::new(),
			next_id: 0,
		}
	}

	/// Registers `handler` under `pattern`.
	///
	/// Returns the new id and whether the pattern was not previously
	/// present (the caller may need a wire-level subscribe for fresh
	/// patterns).
	pub fn subscribe(
		&mut self,
		pattern: TopicPattern,
		qos: QoS,
		handler: T,
	) -> (bool, SubscriptionId) {
		let id = SubscriptionId(self.next_id);
		self.next_id = self.next_id.wrapping_add(1);

		let key = pattern.pattern();
		let fresh = !self.entries.contains_key(&key);
		let entry =
			self.entries
				.entry(key.clone())
				.or_insert_with(|| PatternEntry {
					pattern,
					handlers: HashMap::new(),
				});
		entry.handlers.insert(id, (qos, handler));
		self.index.insert(id, key);

		(fresh, id)
	}

	/// Removes exactly the handler registered under `id`.
	///
	/// When a pattern's handler set empties, the pattern entry is removed
	/// entirely. Returns the pattern the handler was registered under.
	pub fn unsubscribe(
		&mut self,
		id: SubscriptionId,
	) -> Result<ArcStr, RouterError> {
		let key = self
			.index
			.remove(&id)
			.ok_or_else(|| RouterError::subscription_not_found(id))?;
		if let Some(entry) = self.entries.get_mut(&key) {
			entry.handlers.remove(&id);
			if entry.handlers.is_empty() {
				self.entries.remove(&key);
			}
		}
		Ok(key)
	}

	/// Collects every handler whose pattern structurally matches `topic`.
	///
	/// Order across patterns and within a handler set is unspecified; each
	/// matching handler appears exactly once.
	pub fn matches(
		&self,
		topic: &TopicPath,
	) -> Vec<(SubscriptionId, &ArcStr, &T)> {
		let mut matched = Vec::new();
		for (key, entry) in &self.entries {
			if entry.pattern.matches(topic) {
				for (id, (_, handler)) in &entry.handlers {
					matched.push((*id, key, handler));
				}
			}
		}
		matched
	}

	/// Number of registered handlers across all patterns.
	pub fn handler_count(&self) -> usize {
		self.index.len()
	}

	/// Number of distinct patterns.
	pub fn pattern_count(&self) -> usize {
		self.entries.len()
	}

	/// Every active pattern with the highest QoS among its handlers.
	///
	/// This is what the link replays against the broker after (re)connect.
	pub fn wire_subscriptions(&self) -> Vec<(ArcStr, QoS)> {
		self.entries
			.iter()
			.map(|(key, entry)| {
				let qos = entry
					.handlers
					.values()
					.map(|(qos, _)| *qos)
					.max_by_key(|qos| *qos as u8)
					.unwrap_or(QoS::AtMostOnce);
				(key.clone(), qos)
			})
			.collect()
	}

	/// Drops every entry, returning the handlers for caller-side cleanup.
	pub fn clear(&mut self) -> Vec<T> {
		self.index.clear();
		self.entries
			.drain()
			.flat_map(|(_, entry)| {
				entry.handlers.into_values().map(|(_, handler)| handler)
			})
			.collect()
	}
}
