//! Persistence collaborator boundary.
//!
//! The real store (and the HTTP layer querying it) live outside this
//! crate; [`ReadingStore`] is the seam they plug into. [`MemoryStore`]
//! backs tests and the historical-bootstrap path.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::payload::SensorReading;

/// Failures at the persistence boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
	/// The store refused an append.
	#[error("store rejected write: {reason}")]
	WriteRejected {
		/// Store-reported reason.
		reason: String,
	},

	/// A query could not be served.
	#[error("store query failed: {reason}")]
	QueryFailed {
		/// Store-reported reason.
		reason: String,
	},
}

impl StoreError {
	/// Creates a new WriteRejected error.
	pub fn write_rejected(reason: impl Into<String>) -> Self {
		Self::WriteRejected {
			reason: reason.into(),
		}
	}

	/// Creates a new QueryFailed error.
	pub fn query_failed(reason: impl Into<String>) -> Self {
		Self::QueryFailed {
			reason: reason.into(),
		}
	}
}

/// Query filter: by sensor id and/or inclusive time range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingFilter {
	/// Restrict to one sensor.
	pub sensor_id: Option<String>,
	/// Earliest timestamp to include.
	pub from: Option<DateTime<Utc>>,
	/// Latest timestamp to include.
	pub until: Option<DateTime<Utc>>,
}

impl ReadingFilter {
	/// Matches everything.
	pub fn all() -> Self {
		Self::default()
	}

	/// Restricts to `sensor_id`.
	pub fn sensor(mut self, sensor_id: impl Into<String>) -> Self {
		self.sensor_id = Some(sensor_id.into());
		self
	}

	/// Restricts to readings at or after `from`.
	pub fn since(mut self, from: DateTime<Utc>) -> Self {
		self.from = Some(from);
		self
	}

	/// Restricts to readings at or before `until`.
	pub fn until(mut self, until: DateTime<Utc>) -> Self {
		self.until = Some(until);
		self
	}

	/// Whether `reading` passes this filter.
	pub fn accepts(&self, reading: &SensorReading) -> bool {
		if let Some(sensor_id) = &self.sensor_id {
			if reading.sensor_id != *sensor_id {
				return false;
			}
		}
		if let Some(from) = self.from {
			if reading.timestamp < from {
				return false;
			}
		}
		if let Some(until) = self.until {
			if reading.timestamp > until {
				return false;
			}
		}
		true
	}
}

/// The persistence collaborator interface.
#[async_trait]
pub trait ReadingStore: Send + Sync {
	/// Persists one reading.
	async fn append(&self, reading: &SensorReading)
	-> Result<(), StoreError>;

	/// Returns readings matching `filter`, oldest first.
	async fn query(
		&self,
		filter: &ReadingFilter,
	) -> Result<Vec<SensorReading>, StoreError>;
}

/// Reading store held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
	readings: RwLock<Vec<SensorReading>>,
}

impl MemoryStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of stored readings.
	pub fn len(&self) -> usize {
		self.read().len()
	}

	/// True when nothing has been stored.
	pub fn is_empty(&self) -> bool {
		self.read().is_empty()
	}

	fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<SensorReading>> {
		self.readings
			.read()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

#[async_trait]
impl ReadingStore for MemoryStore {
	async fn append(
		&self,
		reading: &SensorReading,
	) -> Result<(), StoreError> {
		self.readings
			.write()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.push(reading.clone());
		Ok(())
	}

	async fn query(
		&self,
		filter: &ReadingFilter,
	) -> Result<Vec<SensorReading>, StoreError> {
		let mut matched: Vec<SensorReading> = self
			.read()
			.iter()
			.filter(|reading| filter.accepts(reading))
			.cloned()
			.collect();
		matched.sort_by_key(|reading| reading.timestamp);
		Ok(matched)
	}
}
