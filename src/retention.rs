//! Time-windowed retention buffer for live readings.
//!
//! Turns the unbounded inbound reading stream into a bounded, queryable
//! working set: a timestamp-ordered buffer that trims itself against
//! `now - window` on every insert. It is purely a filter over what it has
//! already seen; consumers wanting a longer history than has accumulated
//! since subscription query the persistence collaborator instead.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::payload::SensorReading;

/// Self-trimming, timestamp-ordered buffer of recent readings.
///
/// Size is bounded by `window / average inter-arrival time` in the steady
/// state, not by a fixed capacity. Never holds an entry older than
/// `now - window`.
#[derive(Debug)]
pub struct RetentionWindow {
	window: Duration,
	entries: VecDeque<SensorReading>,
}

impl RetentionWindow {
	/// Creates an empty buffer covering `window` back from now.
	pub fn new(window: Duration) -> Self {
		Self {
			window,
			entries: VecDeque::new(),
		}
	}

	/// The active window.
	pub fn window(&self) -> Duration {
		self.window
	}

	/// Inserts a reading in timestamp order, then evicts everything that
	/// fell out of the window. Eviction runs on every insert; there is no
	/// separate trim timer.
	pub fn insert(&mut self, reading: SensorReading) {
		self.insert_ordered(reading);
		self.evict(Utc::now());
	}

	/// Replaces the window and immediately re-evicts against the new
	/// cutoff. Entries still valid under the new window are kept; nothing
	/// is re-fetched.
	pub fn set_window(&mut self, window: Duration) {
		self.window = window;
		self.evict(Utc::now());
	}

	/// Seeds the buffer from a historical query, typically once at
	/// startup before live traffic arrives.
	pub fn seed(
		&mut self,
		readings: impl IntoIterator<Item = SensorReading>,
	) {
		for reading in readings {
			self.insert_ordered(reading);
		}
		self.evict(Utc::now());
	}

	/// Copy of the current entries, oldest first.
	pub fn snapshot(&self) -> Vec<SensorReading> {
		self.entries.iter().cloned().collect()
	}

	/// Iterates current entries, oldest first.
	pub fn iter(&self) -> impl Iterator<Item = &SensorReading> {
		self.entries.iter()
	}

	/// Most recent entry, if any.
	pub fn latest(&self) -> Option<&SensorReading> {
		self.entries.back()
	}

	/// Number of retained entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// True when nothing is retained.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	fn insert_ordered(&mut self, reading: SensorReading) {
		let index = self
			.entries
			.partition_point(|entry| entry.timestamp <= reading.timestamp);
		self.entries.insert(index, reading);
	}

	fn evict(&mut self, now: DateTime<Utc>) {
		let span = chrono::Duration::from_std(self.window)
			.unwrap_or(chrono::Duration::MAX);
		let Some(cutoff) = now.checked_sub_signed(span) else {
			// window reaches past representable time, nothing can expire
			return;
		};
		let before = self.entries.len();
		while self
			.entries
			.front()
			.is_some_and(|entry| entry.timestamp < cutoff)
		{
			self.entries.pop_front();
		}
		if before != self.entries.len() {
			trace!(
				evicted = before - self.entries.len(),
				retained = self.entries.len(),
				"retention eviction"
			);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn reading_at(
		sensor_id: &str,
		timestamp: DateTime<Utc>,
	) -> SensorReading {
		SensorReading {
			sensor_id: sensor_id.to_string(),
			value: 21.0,
			unit: "celsius".to_string(),
			timestamp,
		}
	}

	#[test]
	fn evicts_entries_older_than_window_on_insert() {
		let now = Utc::now();
		let mut buffer =
			RetentionWindow::new(Duration::from_secs(60 * 60));

		// t, t+1h (nudged inside the cutoff), t+2h
		let t = now - chrono::Duration::hours(2);
		buffer.insert(reading_at("s1", t));
		buffer.insert(reading_at(
			"s1",
			t + chrono::Duration::hours(1) + chrono::Duration::seconds(1),
		));
		buffer.insert(reading_at("s1", now));

		assert_eq!(buffer.len(), 2);
		let cutoff = now - chrono::Duration::hours(1);
		assert!(buffer.iter().all(|entry| entry.timestamp > cutoff));
	}

	#[test]
	fn shrinking_window_re_evicts_immediately() {
		let now = Utc::now();
		let mut buffer =
			RetentionWindow::new(Duration::from_secs(24 * 60 * 60));
		buffer.insert(reading_at("s1", now - chrono::Duration::hours(3)));
		buffer.insert(reading_at(
			"s1",
			now - chrono::Duration::minutes(10),
		));
		assert_eq!(buffer.len(), 2);

		buffer.set_window(Duration::from_secs(60 * 60));
		assert_eq!(buffer.len(), 1);
		assert_eq!(
			buffer.latest().unwrap().timestamp,
			now - chrono::Duration::minutes(10)
		);
	}

	#[test]
	fn growing_window_keeps_surviving_entries() {
		let now = Utc::now();
		let mut buffer =
			RetentionWindow::new(Duration::from_secs(60 * 60));
		buffer.insert(reading_at(
			"s1",
			now - chrono::Duration::minutes(30),
		));

		buffer.set_window(Duration::from_secs(24 * 60 * 60));
		// the buffer is a filter over what it has seen, never a re-fetch
		assert_eq!(buffer.len(), 1);
	}

	#[test]
	fn insert_keeps_timestamp_order_for_out_of_order_arrivals() {
		let now = Utc::now();
		let mut buffer =
			RetentionWindow::new(Duration::from_secs(60 * 60));
		buffer.insert(reading_at("a", now - chrono::Duration::minutes(1)));
		buffer.insert(reading_at("b", now - chrono::Duration::minutes(5)));
		buffer.insert(reading_at("c", now - chrono::Duration::minutes(3)));

		let order: Vec<&str> = buffer
			.iter()
			.map(|entry| entry.sensor_id.as_str())
			.collect();
		assert_eq!(order, vec!["b", "c", "a"]);
	}

	#[test]
	fn seed_orders_and_trims_history() {
		let now = Utc::now();
		let mut buffer =
			RetentionWindow::new(Duration::from_secs(60 * 60));
		buffer.seed(vec![
			reading_at("old", now - chrono::Duration::hours(5)),
			reading_at("recent", now - chrono::Duration::minutes(20)),
			reading_at("older", now - chrono::Duration::minutes(40)),
		]);

		let order: Vec<&str> = buffer
			.iter()
			.map(|entry| entry.sensor_id.as_str())
			.collect();
		assert_eq!(order, vec!["older", "recent"]);
	}
}
