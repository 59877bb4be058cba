//! Full-pipeline tests: simulator → link → router → consumers, all over
//! the in-process broker.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use telemetry_hub::payload::{self, SensorReading, StatusKind};
use telemetry_hub::transport::memory::MemoryBroker;
use telemetry_hub::{
	BrokerLink, IngestionAdapter, LinkConfig, LinkState, MemoryStore,
	PublishOptions, QoS, ReadingFilter, ReadingStore, RetentionWindow,
	SensorConfig, SensorControl, SensorSimulator, Subscription,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn connected_link(broker: &MemoryBroker, client_id: &str) -> BrokerLink {
	let link = BrokerLink::new(broker.transport(), LinkConfig::new(client_id));
	link.connect().await.unwrap();
	link.wait_for(LinkState::Connected).await.unwrap();
	link
}

fn room_sensor_config(interval_ms: u64) -> SensorConfig {
	SensorConfig {
		min_value: 20.0,
		max_value: 30.0,
		update_interval: Duration::from_millis(interval_ms),
		unit: "celsius".to_string(),
		noise: 0.5,
	}
}

/// Drains whatever is deliverable right now without outlasting the next
/// generation tick.
async fn drain(sub: &mut Subscription) -> Vec<SensorReading> {
	let mut readings = Vec::new();
	while let Ok(Some(message)) =
		timeout(Duration::from_millis(10), sub.recv()).await
	{
		readings.push(payload::decode(&message.payload).unwrap());
	}
	readings
}

#[tokio::test(start_paused = true)]
async fn sensor_lifecycle_end_to_end() {
	let broker = MemoryBroker::new();
	let link = connected_link(&broker, "hub").await;

	let mut data_sub = link
		.subscribe("sensor/+/data", QoS::AtMostOnce)
		.await
		.unwrap();
	let mut status_sub = link
		.subscribe("sensor/s1/status", QoS::AtLeastOnce)
		.await
		.unwrap();

	let simulator = SensorSimulator::new(link.clone());
	simulator
		.create_sensor("s1", room_sensor_config(100))
		.await
		.unwrap();

	// registration announces online with a plausible battery
	let announced = timeout(Duration::from_secs(1), status_sub.recv())
		.await
		.expect("online status timed out")
		.expect("status subscription closed");
	let status = payload::decode_status(&announced.payload).unwrap();
	assert_eq!(status.status, StatusKind::Online);
	assert!((70 ..= 100).contains(&status.battery));

	simulator.start_sensor("s1").await.unwrap();
	// idempotent start
	simulator.start_sensor("s1").await.unwrap();

	tokio::time::sleep(Duration::from_millis(1000)).await;
	let readings = drain(&mut data_sub).await;
	assert!(
		readings.len() >= 5,
		"expected at least 5 readings, got {}",
		readings.len()
	);
	for reading in &readings {
		assert_eq!(reading.sensor_id, "s1");
		assert_eq!(reading.unit, "celsius");
		assert!(
			(20.0 ..= 30.0).contains(&reading.value),
			"reading escaped bounds: {}",
			reading.value
		);
	}

	simulator.stop_sensor("s1").await.unwrap();
	drain(&mut data_sub).await; // flush anything in flight at stop time

	// silence after stop
	tokio::time::sleep(Duration::from_millis(500)).await;
	assert!(
		data_sub.try_recv().is_none(),
		"reading arrived after stop returned"
	);

	// and a final offline announcement
	let farewell = timeout(Duration::from_secs(1), status_sub.recv())
		.await
		.expect("offline status timed out")
		.expect("status subscription closed");
	let status = payload::decode_status(&farewell.payload).unwrap();
	assert_eq!(status.status, StatusKind::Offline);
}

#[tokio::test(start_paused = true)]
async fn create_sensor_rejects_invalid_config() {
	let broker = MemoryBroker::new();
	let link = connected_link(&broker, "hub").await;
	let simulator = SensorSimulator::new(link);

	let inverted = SensorConfig {
		min_value: 30.0,
		max_value: 20.0,
		..Default::default()
	};
	assert!(simulator.create_sensor("bad", inverted).await.is_err());
	assert!(simulator.all_sensors().is_empty());

	// unknown sensor operations surface explicit errors
	assert!(simulator.start_sensor("ghost").await.is_err());
	assert!(simulator.stop_sensor("ghost").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn recreating_a_sensor_resets_the_walk() {
	let broker = MemoryBroker::new();
	let link = connected_link(&broker, "hub").await;
	let simulator = SensorSimulator::new(link);

	simulator
		.create_sensor("s1", room_sensor_config(100))
		.await
		.unwrap();
	let wider = SensorConfig {
		min_value: 0.0,
		max_value: 100.0,
		..room_sensor_config(100)
	};
	simulator.create_sensor("s1", wider.clone()).await.unwrap();

	assert_eq!(simulator.all_sensors(), vec!["s1".to_string()]);
	assert_eq!(simulator.sensor_config("s1"), Some(wider));
}

#[tokio::test(start_paused = true)]
async fn ingestion_persists_valid_readings_and_drops_malformed() {
	let broker = MemoryBroker::new();
	let link = connected_link(&broker, "hub").await;

	let store = Arc::new(MemoryStore::new());
	let (status_tx, mut status_rx) = mpsc::channel(16);
	let adapter =
		IngestionAdapter::spawn(&link, store.clone(), status_tx)
			.await
			.unwrap();

	// malformed payloads must not stall the pipeline
	link.publish(
		"sensor/x/data",
		Bytes::from_static(b"not json"),
		PublishOptions::default(),
	)
	.await
	.unwrap();
	link.publish(
		"sensor/x/data",
		Bytes::from_static(br#"{"sensorId":"x"}"#),
		PublishOptions::default(),
	)
	.await
	.unwrap();

	let reading = SensorReading {
		sensor_id: "x".to_string(),
		value: 23.5,
		unit: "celsius".to_string(),
		timestamp: Utc::now(),
	};
	link.publish(
		"sensor/x/data",
		payload::encode(&reading).unwrap(),
		PublishOptions::default(),
	)
	.await
	.unwrap();

	let announcement = telemetry_hub::SensorStatus {
		sensor_id: "x".to_string(),
		status: StatusKind::Online,
		battery: 81,
		timestamp: Utc::now(),
	};
	link.publish(
		"sensor/x/status",
		payload::encode(&announcement).unwrap(),
		PublishOptions::default(),
	)
	.await
	.unwrap();

	tokio::time::sleep(Duration::from_millis(50)).await;

	// only the valid reading was persisted
	assert_eq!(store.len(), 1);
	let stored = store.query(&ReadingFilter::all()).await.unwrap();
	assert_eq!(stored[0].sensor_id, "x");
	assert_eq!(stored[0].value, 23.5);

	// the status went to the sink, not into the store
	let forwarded = status_rx.try_recv().unwrap();
	assert_eq!(forwarded.battery, 81);

	adapter.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn remote_commands_and_config_drive_the_simulator() {
	let broker = MemoryBroker::new();
	let link = connected_link(&broker, "hub").await;
	let simulator = SensorSimulator::new(link.clone());
	let control = SensorControl::spawn(simulator.clone()).await.unwrap();

	simulator
		.create_sensor("s1", room_sensor_config(100))
		.await
		.unwrap();
	assert!(!simulator.is_running("s1"));

	// an external controller starts the sensor over the command topic
	link.publish(
		"sensor/s1/command",
		Bytes::from_static(br#"{"action":"start"}"#),
		PublishOptions::default().qos(QoS::AtLeastOnce),
	)
	.await
	.unwrap();
	tokio::time::sleep(Duration::from_millis(50)).await;
	assert!(simulator.is_running("s1"));

	// config updates re-validate and take effect
	link.publish(
		"sensor/s1/config",
		Bytes::from_static(br#"{"minValue":10.0,"maxValue":50.0}"#),
		PublishOptions::default().qos(QoS::AtLeastOnce),
	)
	.await
	.unwrap();
	tokio::time::sleep(Duration::from_millis(50)).await;
	let config = simulator.sensor_config("s1").unwrap();
	assert_eq!(config.min_value, 10.0);
	assert_eq!(config.max_value, 50.0);

	// malformed control traffic is dropped without killing the listener
	link.publish(
		"sensor/s1/command",
		Bytes::from_static(b"garbage"),
		PublishOptions::default(),
	)
	.await
	.unwrap();
	link.publish(
		"sensor/s1/command",
		Bytes::from_static(br#"{"action":"stop"}"#),
		PublishOptions::default().qos(QoS::AtLeastOnce),
	)
	.await
	.unwrap();
	tokio::time::sleep(Duration::from_millis(50)).await;
	assert!(!simulator.is_running("s1"));

	control.shutdown().await;
	simulator.stop_sensor("s1").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn retention_window_tracks_live_readings_after_bootstrap() {
	let broker = MemoryBroker::new();
	let link = connected_link(&broker, "hub").await;

	// historical bootstrap: seed from the persistence collaborator once
	let store = MemoryStore::new();
	let old = SensorReading {
		sensor_id: "s1".to_string(),
		value: 22.0,
		unit: "celsius".to_string(),
		timestamp: Utc::now() - chrono::Duration::minutes(10),
	};
	store.append(&old).await.unwrap();

	let mut window = RetentionWindow::new(Duration::from_secs(3600));
	window.seed(store.query(&ReadingFilter::all()).await.unwrap());
	assert_eq!(window.len(), 1);

	let mut data_sub = link
		.subscribe("sensor/+/data", QoS::AtMostOnce)
		.await
		.unwrap();
	let simulator = SensorSimulator::new(link.clone());
	simulator
		.create_sensor("s1", room_sensor_config(100))
		.await
		.unwrap();
	simulator.start_sensor("s1").await.unwrap();

	tokio::time::sleep(Duration::from_millis(500)).await;
	for reading in drain(&mut data_sub).await {
		window.insert(reading);
	}
	simulator.stop_sensor("s1").await.unwrap();

	assert!(window.len() > 1, "live readings should join the seed");
	let snapshot = window.snapshot();
	assert_eq!(snapshot.first().unwrap().value, 22.0);
	assert!(snapshot
		.windows(2)
		.all(|pair| pair[0].timestamp <= pair[1].timestamp));
}
