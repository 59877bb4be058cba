//! Sensor registry and the per-sensor generation schedules.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use rumqttc::QoS;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use super::config::{SensorConfig, SimulatorError};
use crate::link::{BrokerLink, PublishOptions};
use crate::payload::{self, SensorReading, SensorStatus, StatusKind};

struct SensorSlot {
	config: SensorConfig,
	last_value: f64,
	task: Option<JoinHandle<()>>,
}

impl SensorSlot {
	fn is_running(&self) -> bool {
		self.task.as_ref().is_some_and(|task| !task.is_finished())
	}
}

/// Registry of virtual sensors, each with an independently scheduled
/// generation task.
///
/// Cloning shares the registry; each sensor id has at most one runtime
/// slot and a running sensor has exactly one generation task, keyed by id
/// and cancelled deterministically through its join handle.
#[derive(Clone)]
pub struct SensorSimulator {
	link: BrokerLink,
	sensors: Arc<Mutex<HashMap<String, SensorSlot>>>,
}

impl SensorSimulator {
	/// Simulator publishing through `link`.
	pub fn new(link: BrokerLink) -> Self {
		Self {
			link,
			sensors: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	/// The link this simulator publishes through.
	pub fn link(&self) -> &BrokerLink {
		&self.link
	}

	/// Registers (or re-registers) a sensor.
	///
	/// Validation failures leave the registry untouched. Re-creating an
	/// existing id overwrites its config and resets the walk to the new
	/// midpoint; a running schedule keeps its old cadence until
	/// restarted. An `online` status is announced immediately.
	pub async fn create_sensor(
		&self,
		sensor_id: &str,
		config: SensorConfig,
	) -> Result<(), SimulatorError> {
		config.validate()?;
		let last_value = config.midpoint();
		{
			let mut sensors = self.lock();
			match sensors.entry(sensor_id.to_string()) {
				| Entry::Occupied(mut occupied) => {
					let slot = occupied.get_mut();
					slot.config = config;
					slot.last_value = last_value;
				}
				| Entry::Vacant(vacant) => {
					vacant.insert(SensorSlot {
						config,
						last_value,
						task: None,
					});
				}
			}
		}
		info!(sensor_id, "sensor registered");
		self.publish_status(sensor_id, StatusKind::Online).await;
		Ok(())
	}

	/// Begins the periodic generation schedule for `sensor_id`.
	///
	/// Idempotent for a sensor that is already running.
	pub async fn start_sensor(
		&self,
		sensor_id: &str,
	) -> Result<(), SimulatorError> {
		{
			let mut sensors = self.lock();
			let slot = sensors.get_mut(sensor_id).ok_or_else(|| {
				SimulatorError::unknown_sensor(sensor_id)
			})?;
			if slot.is_running() {
				debug!(sensor_id, "sensor already running");
				return Ok(());
			}
			let task = tokio::spawn(Self::generation_loop(
				self.clone(),
				sensor_id.to_string(),
				slot.config.update_interval,
			));
			slot.task = Some(task);
		}
		info!(sensor_id, "sensor started");
		Ok(())
	}

	/// Cancels the generation schedule for `sensor_id`.
	///
	/// No-op if the sensor is not running. Once this returns no further
	/// tick fires; an `offline` status is announced afterwards.
	pub async fn stop_sensor(
		&self,
		sensor_id: &str,
	) -> Result<(), SimulatorError> {
		let task = {
			let mut sensors = self.lock();
			let slot = sensors.get_mut(sensor_id).ok_or_else(|| {
				SimulatorError::unknown_sensor(sensor_id)
			})?;
			slot.task.take()
		};
		let Some(task) = task else {
			debug!(sensor_id, "sensor not running, stop ignored");
			return Ok(());
		};
		task.abort();
		let _ = task.await;
		info!(sensor_id, "sensor stopped");
		self.publish_status(sensor_id, StatusKind::Offline).await;
		Ok(())
	}

	/// Resets the walk to the configured midpoint.
	pub fn reset_sensor(
		&self,
		sensor_id: &str,
	) -> Result<(), SimulatorError> {
		let mut sensors = self.lock();
		let slot = sensors
			.get_mut(sensor_id)
			.ok_or_else(|| SimulatorError::unknown_sensor(sensor_id))?;
		slot.last_value = slot.config.midpoint();
		debug!(sensor_id, "sensor walk reset");
		Ok(())
	}

	/// Applies a partial configuration update.
	///
	/// A running sensor's schedule is restarted (silently, without the
	/// offline/online status churn of stop/start) so a new interval takes
	/// effect at once.
	pub async fn update_config(
		&self,
		sensor_id: &str,
		update: &crate::payload::ConfigUpdate,
	) -> Result<(), SimulatorError> {
		let previous_task = {
			let mut sensors = self.lock();
			let slot = sensors.get_mut(sensor_id).ok_or_else(|| {
				SimulatorError::unknown_sensor(sensor_id)
			})?;
			slot.config = slot.config.apply(update)?;
			slot.task.take()
		};
		info!(sensor_id, "sensor config updated");

		let Some(task) = previous_task else {
			return Ok(());
		};
		task.abort();
		let _ = task.await;
		let mut sensors = self.lock();
		if let Some(slot) = sensors.get_mut(sensor_id) {
			// a concurrent start may have claimed the schedule already
			if !slot.is_running() {
				let task = tokio::spawn(Self::generation_loop(
					self.clone(),
					sensor_id.to_string(),
					slot.config.update_interval,
				));
				slot.task = Some(task);
			}
		}
		Ok(())
	}

	/// Ids of every registered sensor, running or not.
	pub fn all_sensors(&self) -> Vec<String> {
		self.lock().keys().cloned().collect()
	}

	/// Current configuration of `sensor_id`, if registered.
	pub fn sensor_config(&self, sensor_id: &str) -> Option<SensorConfig> {
		self.lock().get(sensor_id).map(|slot| slot.config.clone())
	}

	/// True while `sensor_id` has an active generation schedule.
	pub fn is_running(&self, sensor_id: &str) -> bool {
		self.lock()
			.get(sensor_id)
			.is_some_and(SensorSlot::is_running)
	}

	fn lock(
		&self,
	) -> std::sync::MutexGuard<'_, HashMap<String, SensorSlot>> {
		self.sensors
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	async fn generation_loop(
		simulator: SensorSimulator,
		sensor_id: String,
		period: Duration,
	) {
		let mut ticks = interval_at(Instant::now() + period, period);
		loop {
			ticks.tick().await;
			let Some(reading) = simulator.generate_reading(&sensor_id)
			else {
				// sensor was deregistered out from under the schedule
				break;
			};
			let topic = payload::sensor_data_topic(&sensor_id);
			let bytes = match payload::encode(&reading) {
				| Ok(bytes) => bytes,
				| Err(err) => {
					warn!(sensor_id, error = %err, "reading serialization failed");
					continue;
				}
			};
			if let Err(err) = simulator
				.link
				.publish(&topic, bytes, PublishOptions::default())
				.await
			{
				warn!(sensor_id, error = %err, "dropping reading, publish failed");
			}
		}
	}

	/// One generation tick: advance the walk and build the reading.
	fn generate_reading(&self, sensor_id: &str) -> Option<SensorReading> {
		let mut sensors = self.lock();
		let slot = sensors.get_mut(sensor_id)?;
		let now = Utc::now();
		let value = next_value(
			&slot.config,
			slot.last_value,
			now.timestamp_millis(),
			&mut rand::thread_rng(),
		);
		slot.last_value = value;
		Some(SensorReading {
			sensor_id: sensor_id.to_string(),
			value: round2(value),
			unit: slot.config.unit.clone(),
			timestamp: now,
		})
	}

	async fn publish_status(&self, sensor_id: &str, status: StatusKind) {
		let announcement = SensorStatus {
			sensor_id: sensor_id.to_string(),
			status,
			battery: rand::thread_rng().gen_range(70..=100),
			timestamp: Utc::now(),
		};
		let bytes = match payload::encode(&announcement) {
			| Ok(bytes) => bytes,
			| Err(err) => {
				warn!(sensor_id, error = %err, "status serialization failed");
				return;
			}
		};
		let topic = payload::sensor_status_topic(sensor_id);
		if let Err(err) = self
			.link
			.publish(
				&topic,
				bytes,
				PublishOptions::default().qos(QoS::AtLeastOnce),
			)
			.await
		{
			warn!(sensor_id, status = %status, error = %err, "status publish failed");
		}
	}
}

/// One step of the bounded random walk.
///
/// `candidate = last + uniform(-1,1)·noise + sin(now_ms/10000)·range·0.1`,
/// clamped to the configured bounds. The sinusoidal phase is shared by
/// every sensor (period ≈ 62.8 s); the result is never a pure random
/// process and never escapes `[min, max]`.
fn next_value(
	config: &SensorConfig,
	last_value: f64,
	now_ms: i64,
	rng: &mut impl Rng,
) -> f64 {
	let noise = rng.gen_range(-1.0..=1.0) * config.noise;
	let trend = (now_ms as f64 / 10_000.0).sin() * config.range() * 0.1;
	(last_value + noise + trend)
		.clamp(config.min_value, config.max_value)
}

fn round2(value: f64) -> f64 {
	(value * 100.0).round() / 100.0
}
