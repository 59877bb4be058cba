//! # Telemetry Hub
//!
//! Real-time sensor telemetry distribution core: one shared broker link,
//! wildcard topic routing with handler fan-out, a synthetic sensor
//! simulator to drive the system, and a time-windowed retention buffer
//! turning the unbounded message stream into a bounded working set.
//!
//! ## Features
//!
//! - **Broker link lifecycle**: connect / fixed-interval reconnect /
//!   clean disconnect, with a retained liveness announcement and its
//!   last-will counterpart, and an observable transition log
//! - **Pattern routing**: MQTT-style `+` and `#` wildcards, overlapping
//!   patterns, per-handler delivery that never blocks the stream
//! - **Subscriptions that survive reconnects**: the pattern table outlives
//!   the session and is replayed onto every fresh connection
//! - **Pluggable transport**: rumqttc for real brokers, an in-process
//!   broker for hermetic tests and demos
//! - **Typed payloads**: every wire payload is validated into a serde
//!   schema on ingress; malformed telemetry is dropped, never persisted
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use telemetry_hub::prelude::*;
//! use telemetry_hub::transport::memory::MemoryBroker;
//!
//! #[tokio::main]
//! async fn main() -> telemetry_hub::Result<()> {
//! 	let broker = MemoryBroker::new();
//! 	let link = BrokerLink::new(broker.transport(), LinkConfig::new("hub"));
//! 	link.connect().await?;
//! 	link.wait_for(LinkState::Connected).await?;
//!
//! 	// live rolling view over the last hour of readings
//! 	let mut window = RetentionWindow::new(Duration::from_secs(3600));
//! 	let mut readings =
//! 		link.subscribe("sensor/+/data", QoS::AtMostOnce).await?;
//!
//! 	let simulator = SensorSimulator::new(link.clone());
//! 	simulator
//! 		.create_sensor("temp-room1", SensorConfig::default())
//! 		.await?;
//! 	simulator.start_sensor("temp-room1").await?;
//!
//! 	while let Some(message) = readings.recv().await {
//! 		let reading: SensorReading =
//! 			telemetry_hub::payload::decode(&message.payload)?;
//! 		window.insert(reading);
//! 		if window.len() >= 3 {
//! 			break;
//! 		}
//! 	}
//!
//! 	simulator.stop_sensor("temp-room1").await?;
//! 	link.disconnect().await?;
//! 	Ok(())
//! }
//! ```
//!
//! ## Topic namespace
//!
//! | Topic | Payload |
//! |---|---|
//! | `sensor/{id}/data` | reading: `{sensorId, value, unit, timestamp}` |
//! | `sensor/{id}/status` | `{sensorId, status, battery, timestamp}` |
//! | `sensor/{id}/config` | partial config update |
//! | `sensor/{id}/command` | `{action: "start"\|"stop"\|"reset"}` |
//! | `liveness` (retained) | `"online"` / `"offline"` |

#![warn(missing_docs)]

pub mod error;
pub mod ingest;
pub mod link;
pub mod payload;
pub mod retention;
pub mod routing;
pub mod simulator;
pub mod store;
pub mod topic;
pub mod transport;

pub use error::{Result, TelemetryError};
pub use ingest::IngestionAdapter;
pub use link::{BrokerLink, LinkConfig, LinkError, LinkState, PublishOptions, Transition};
pub use payload::{
	CommandAction, ConfigUpdate, SensorCommand, SensorReading, SensorStatus,
	StatusKind,
};
pub use retention::RetentionWindow;
pub use routing::{MessageRouter, Subscription};
// Essential external types
pub use rumqttc::QoS;
pub use simulator::{SensorConfig, SensorControl, SensorSimulator};
pub use store::{MemoryStore, ReadingFilter, ReadingStore, StoreError};
pub use topic::{TopicPath, TopicPattern};
pub use transport::Message;

/// Prelude module for convenient imports
///
/// The types most applications need, importable in one line:
///
/// ```rust
/// use telemetry_hub::prelude::*;
/// ```
pub mod prelude {
	pub use crate::error::{Result, TelemetryError};
	pub use crate::ingest::IngestionAdapter;
	pub use crate::link::{
		BrokerLink, LinkConfig, LinkError, LinkState, PublishOptions,
		Transition,
	};
	pub use crate::payload::{SensorReading, SensorStatus, StatusKind};
	pub use crate::retention::RetentionWindow;
	pub use crate::routing::Subscription;
	pub use crate::simulator::{
		SensorConfig, SensorControl, SensorSimulator,
	};
	pub use crate::store::{MemoryStore, ReadingFilter, ReadingStore};
	pub use crate::transport::Message;
	pub use rumqttc::QoS;
}

/// Error types used throughout the library
///
/// Re-exports every error type in one place for error handling code.
pub mod errors {
	pub use crate::error::TelemetryError;
	pub use crate::link::LinkError;
	pub use crate::payload::PayloadError;
	pub use crate::simulator::SimulatorError;
	pub use crate::store::StoreError;
	pub use crate::topic::{PatternError, RouterError};
	pub use crate::transport::ConnectionError;
}
