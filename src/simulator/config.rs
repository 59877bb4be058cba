//! Sensor configuration and validation.

use std::time::Duration;

use thiserror::Error;

use crate::payload::ConfigUpdate;

/// Errors surfaced by simulator operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulatorError {
	/// Operation addressed a sensor id that was never registered.
	#[error("sensor '{sensor_id}' is not registered")]
	UnknownSensor {
		/// The unregistered id.
		sensor_id: String,
	},

	/// Configuration failed validation; the sensor is not (re)registered.
	#[error("invalid sensor config: {reason}")]
	InvalidConfig {
		/// What was wrong.
		reason: String,
	},
}

impl SimulatorError {
	/// Creates a new UnknownSensor error.
	pub fn unknown_sensor(sensor_id: impl Into<String>) -> Self {
		Self::UnknownSensor {
			sensor_id: sensor_id.into(),
		}
	}

	/// Creates a new InvalidConfig error.
	pub fn invalid_config(reason: impl Into<String>) -> Self {
		Self::InvalidConfig {
			reason: reason.into(),
		}
	}
}

/// Static configuration of one virtual sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorConfig {
	/// Lower bound of generated values.
	pub min_value: f64,
	/// Upper bound of generated values; must exceed `min_value`.
	pub max_value: f64,
	/// Period of the generation schedule.
	pub update_interval: Duration,
	/// Unit attached to every reading.
	pub unit: String,
	/// Symmetric noise amplitude, `>= 0`.
	pub noise: f64,
}

impl Default for SensorConfig {
	/// A room-temperature sensor: 20–30 celsius every 5 s with ±0.5
	/// noise.
	fn default() -> Self {
		Self {
			min_value: 20.0,
			max_value: 30.0,
			update_interval: Duration::from_secs(5),
			unit: "celsius".to_string(),
			noise: 0.5,
		}
	}
}

impl SensorConfig {
	/// Rejects nonsensical bounds, a zero interval and negative noise.
	pub fn validate(&self) -> Result<(), SimulatorError> {
		if !self.min_value.is_finite() || !self.max_value.is_finite() {
			return Err(SimulatorError::invalid_config(
				"value bounds must be finite",
			));
		}
		if self.min_value >= self.max_value {
			return Err(SimulatorError::invalid_config(format!(
				"minValue {} must be below maxValue {}",
				self.min_value, self.max_value
			)));
		}
		if self.update_interval.is_zero() {
			return Err(SimulatorError::invalid_config(
				"update interval must be positive",
			));
		}
		if !self.noise.is_finite() || self.noise < 0.0 {
			return Err(SimulatorError::invalid_config(
				"noise must be non-negative",
			));
		}
		Ok(())
	}

	/// Midpoint of the value bounds; the walk starts (and resets) here.
	pub fn midpoint(&self) -> f64 {
		(self.min_value + self.max_value) / 2.0
	}

	/// Width of the value bounds.
	pub fn range(&self) -> f64 {
		self.max_value - self.min_value
	}

	/// Applies a partial remote update, validating the result.
	pub fn apply(
		&self,
		update: &ConfigUpdate,
	) -> Result<SensorConfig, SimulatorError> {
		let mut next = self.clone();
		if let Some(min_value) = update.min_value {
			next.min_value = min_value;
		}
		if let Some(max_value) = update.max_value {
			next.max_value = max_value;
		}
		if let Some(millis) = update.update_interval_ms {
			next.update_interval = Duration::from_millis(millis);
		}
		if let Some(noise) = update.noise {
			next.noise = noise;
		}
		next.validate()?;
		Ok(next)
	}
}
