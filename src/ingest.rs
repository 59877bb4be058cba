//! Ingestion adapter: validates inbound telemetry on the data and status
//! topics and hands it across the collaborator boundaries.
//!
//! Malformed payloads are dropped with a logged diagnostic and never
//! retried: telemetry loss is acceptable, persisted corruption is not.

use std::sync::Arc;

use rumqttc::QoS;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::link::{BrokerLink, LinkError};
use crate::payload::{self, SensorReading, SensorStatus};
use crate::routing::Subscription;
use crate::store::ReadingStore;
use crate::transport::Message;

/// Background task subscribed to `sensor/+/data` and `sensor/+/status`.
///
/// Valid readings are appended to the persistence collaborator; valid
/// statuses are forwarded to the status sink and not held locally.
pub struct IngestionAdapter {
	task: JoinHandle<()>,
}

impl IngestionAdapter {
	/// Subscribes the telemetry topics and starts ingesting.
	pub async fn spawn(
		link: &BrokerLink,
		store: Arc<dyn ReadingStore>,
		status_sink: mpsc::Sender<SensorStatus>,
	) -> Result<Self, LinkError> {
		let data_sub = link
			.subscribe(payload::SENSOR_DATA_PATTERN, QoS::AtLeastOnce)
			.await?;
		let status_sub = link
			.subscribe(payload::SENSOR_STATUS_PATTERN, QoS::AtLeastOnce)
			.await?;
		let task = tokio::spawn(Self::run(
			store,
			status_sink,
			data_sub,
			status_sub,
		));
		Ok(Self { task })
	}

	/// Stops ingesting and releases the subscriptions.
	pub async fn shutdown(self) {
		self.task.abort();
		let _ = self.task.await;
	}

	async fn run(
		store: Arc<dyn ReadingStore>,
		status_sink: mpsc::Sender<SensorStatus>,
		mut data_sub: Subscription,
		mut status_sub: Subscription,
	) {
		loop {
			tokio::select! {
				message = data_sub.recv() => match message {
					| Some(message) => {
						Self::handle_data(store.as_ref(), &message).await;
					}
					| None => break,
				},
				message = status_sub.recv() => match message {
					| Some(message) => {
						Self::handle_status(&status_sink, &message);
					}
					| None => break,
				},
			}
		}
		debug!("ingestion adapter stopped");
	}

	async fn handle_data(store: &dyn ReadingStore, message: &Message) {
		let reading = match payload::decode::<SensorReading>(
			&message.payload,
		) {
			| Ok(reading) => reading,
			| Err(err) => {
				warn!(
					topic = %message.topic,
					error = %err,
					"dropping malformed data payload"
				);
				return;
			}
		};
		if let Err(err) = store.append(&reading).await {
			// loss is acceptable; the stream must keep flowing
			warn!(
				sensor_id = %reading.sensor_id,
				error = %err,
				"reading not persisted"
			);
		} else {
			debug!(
				sensor_id = %reading.sensor_id,
				value = reading.value,
				"reading persisted"
			);
		}
	}

	fn handle_status(
		status_sink: &mpsc::Sender<SensorStatus>,
		message: &Message,
	) {
		match payload::decode_status(&message.payload) {
			| Ok(status) => {
				if status_sink.try_send(status).is_err() {
					debug!(
						topic = %message.topic,
						"status sink unavailable, announcement dropped"
					);
				}
			}
			| Err(err) => {
				warn!(
					topic = %message.topic,
					error = %err,
					"dropping malformed status payload"
				);
			}
		}
	}
}
