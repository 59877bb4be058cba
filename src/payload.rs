//! Wire payload schemas, topic names and the JSON codec.
//!
//! Every payload on the wire is JSON with camelCase field names. Inbound
//! payloads are validated into these typed schemas on ingress; a payload
//! that fails validation is a [`PayloadError`] for the caller to log and
//! drop, never an untyped value to poke at.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pattern covering every sensor data topic.
pub const SENSOR_DATA_PATTERN: &str = "sensor/+/data";
/// Pattern covering every sensor status topic.
pub const SENSOR_STATUS_PATTERN: &str = "sensor/+/status";
/// Pattern covering inbound sensor configuration updates.
pub const SENSOR_CONFIG_PATTERN: &str = "sensor/+/config";
/// Pattern covering inbound sensor commands.
pub const SENSOR_COMMAND_PATTERN: &str = "sensor/+/command";

/// Data topic for one sensor.
pub fn sensor_data_topic(sensor_id: &str) -> String {
	format!("sensor/{sensor_id}/data")
}

/// Status topic for one sensor.
pub fn sensor_status_topic(sensor_id: &str) -> String {
	format!("sensor/{sensor_id}/status")
}

/// Payload failed schema validation.
#[derive(Error, Debug)]
pub enum PayloadError {
	/// Not parseable as the expected JSON schema.
	#[error("malformed payload: {0}")]
	Malformed(#[from] serde_json::Error),

	/// Parsed, but a field value is outside its documented range.
	#[error("field '{field}' out of range: {detail}")]
	FieldRange {
		/// Offending field name.
		field: &'static str,
		/// Description of the violation.
		detail: String,
	},
}

impl PayloadError {
	/// Creates a new FieldRange error.
	pub fn field_range(
		field: &'static str,
		detail: impl Into<String>,
	) -> Self {
		Self::FieldRange {
			field,
			detail: detail.into(),
		}
	}
}

/// One published sensor measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
	/// Originating sensor.
	pub sensor_id: String,
	/// Measured value, rounded to two decimals by the simulator.
	pub value: f64,
	/// Unit of measurement; defaults when the publisher omitted it.
	#[serde(default = "default_unit")]
	pub unit: String,
	/// Measurement time; defaults to arrival time when omitted.
	#[serde(default = "Utc::now")]
	pub timestamp: DateTime<Utc>,
}

fn default_unit() -> String {
	"unknown".to_string()
}

/// Online/offline marker in a status payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
	/// Sensor announced itself available.
	Online,
	/// Sensor stopped (or its will fired).
	Offline,
}

impl fmt::Display for StatusKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			| StatusKind::Online => write!(f, "online"),
			| StatusKind::Offline => write!(f, "offline"),
		}
	}
}

/// One published sensor status announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorStatus {
	/// Originating sensor.
	pub sensor_id: String,
	/// Availability marker.
	pub status: StatusKind,
	/// Battery percentage, 0–100.
	pub battery: u8,
	/// Announcement time; defaults to arrival time when omitted.
	#[serde(default = "Utc::now")]
	pub timestamp: DateTime<Utc>,
}

/// Partial configuration update received on a sensor's config topic.
///
/// Absent fields leave the current value untouched. A `sensorId` field in
/// the payload is ignored; the topic names the sensor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
	/// New lower bound.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub min_value: Option<f64>,
	/// New upper bound.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_value: Option<f64>,
	/// New generation interval in milliseconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub update_interval_ms: Option<u64>,
	/// New noise factor.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub noise: Option<f64>,
}

/// Remote control verb received on a sensor's command topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandAction {
	/// Begin periodic generation.
	Start,
	/// Halt periodic generation.
	Stop,
	/// Reset the walk to the configured midpoint.
	Reset,
}

/// Envelope of a command payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorCommand {
	/// The requested action.
	pub action: CommandAction,
}

/// Serializes a payload value to JSON bytes.
pub fn encode<T: Serialize>(value: &T) -> Result<Bytes, PayloadError> {
	Ok(Bytes::from(serde_json::to_vec(value)?))
}

/// Deserializes JSON bytes into a typed payload.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, PayloadError> {
	Ok(serde_json::from_slice(payload)?)
}

/// Decodes and range-checks a status payload.
pub fn decode_status(payload: &[u8]) -> Result<SensorStatus, PayloadError> {
	let status: SensorStatus = decode(payload)?;
	if status.battery > 100 {
		return Err(PayloadError::field_range(
			"battery",
			format!("{} exceeds 100", status.battery),
		));
	}
	Ok(status)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reading_round_trip_uses_camel_case() {
		let reading = SensorReading {
			sensor_id: "temp-room1".to_string(),
			value: 23.42,
			unit: "celsius".to_string(),
			timestamp: Utc::now(),
		};
		let bytes = encode(&reading).unwrap();
		let json: serde_json::Value =
			serde_json::from_slice(&bytes).unwrap();
		assert_eq!(json["sensorId"], "temp-room1");
		assert_eq!(json["value"], 23.42);

		let back: SensorReading = decode(&bytes).unwrap();
		assert_eq!(back, reading);
	}

	#[test]
	fn reading_defaults_missing_unit_and_timestamp() {
		let reading: SensorReading =
			decode(br#"{"sensorId":"s1","value":1.5}"#).unwrap();
		assert_eq!(reading.sensor_id, "s1");
		assert_eq!(reading.unit, "unknown");
	}

	#[test]
	fn reading_without_value_is_malformed() {
		let result: Result<SensorReading, _> =
			decode(br#"{"sensorId":"s1","unit":"celsius"}"#);
		assert!(matches!(result, Err(PayloadError::Malformed(_))));
	}

	#[test]
	fn reading_with_non_numeric_value_is_malformed() {
		let result: Result<SensorReading, _> =
			decode(br#"{"sensorId":"s1","value":"warm"}"#);
		assert!(matches!(result, Err(PayloadError::Malformed(_))));
	}

	#[test]
	fn garbage_is_malformed() {
		let result: Result<SensorReading, _> = decode(b"not json at all");
		assert!(matches!(result, Err(PayloadError::Malformed(_))));
	}

	#[test]
	fn status_parses_lowercase_kinds() {
		let status = decode_status(
			br#"{"sensorId":"s1","status":"online","battery":88}"#,
		)
		.unwrap();
		assert_eq!(status.status, StatusKind::Online);
		assert_eq!(status.battery, 88);
	}

	#[test]
	fn status_battery_out_of_range_is_rejected() {
		let result = decode_status(
			br#"{"sensorId":"s1","status":"online","battery":101}"#,
		);
		assert!(matches!(result, Err(PayloadError::FieldRange { .. })));
	}

	#[test]
	fn config_update_accepts_partial_payloads() {
		let update: ConfigUpdate =
			decode(br#"{"sensorId":"s1","updateIntervalMs":250}"#).unwrap();
		assert_eq!(update.update_interval_ms, Some(250));
		assert_eq!(update.min_value, None);
	}

	#[test]
	fn command_actions_parse_lowercase() {
		let command: SensorCommand =
			decode(br#"{"action":"reset"}"#).unwrap();
		assert_eq!(command.action, CommandAction::Reset);
		assert!(decode::<SensorCommand>(br#"{"action":"explode"}"#).is_err());
	}

	#[test]
	fn topic_builders() {
		assert_eq!(sensor_data_topic("s1"), "sensor/s1/data");
		assert_eq!(sensor_status_topic("s1"), "sensor/s1/status");
	}
}
