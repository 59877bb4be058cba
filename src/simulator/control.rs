//! Control-plane listener: applies remote config and command messages to
//! the simulator.

use rumqttc::QoS;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::engine::SensorSimulator;
use crate::link::LinkError;
use crate::payload::{self, CommandAction, ConfigUpdate, SensorCommand};
use crate::routing::Subscription;
use crate::transport::Message;

/// Background listener on `sensor/+/config` and `sensor/+/command`.
///
/// Malformed control payloads are dropped with a diagnostic; errors from
/// the simulator (unknown sensor, invalid config) are logged, never
/// fatal, since the remote caller has no synchronous channel to answer on.
pub struct SensorControl {
	task: JoinHandle<()>,
}

impl SensorControl {
	/// Subscribes the control topics and starts the listener.
	pub async fn spawn(
		simulator: SensorSimulator,
	) -> Result<Self, LinkError> {
		let link = simulator.link().clone();
		let config_sub = link
			.subscribe(payload::SENSOR_CONFIG_PATTERN, QoS::AtLeastOnce)
			.await?;
		let command_sub = link
			.subscribe(payload::SENSOR_COMMAND_PATTERN, QoS::AtLeastOnce)
			.await?;
		let task =
			tokio::spawn(Self::run(simulator, config_sub, command_sub));
		Ok(Self { task })
	}

	/// Stops the listener and releases its subscriptions.
	pub async fn shutdown(self) {
		self.task.abort();
		let _ = self.task.await;
	}

	async fn run(
		simulator: SensorSimulator,
		mut config_sub: Subscription,
		mut command_sub: Subscription,
	) {
		loop {
			tokio::select! {
				message = config_sub.recv() => match message {
					| Some(message) => {
						Self::handle_config(&simulator, &message).await;
					}
					| None => break,
				},
				message = command_sub.recv() => match message {
					| Some(message) => {
						Self::handle_command(&simulator, &message).await;
					}
					| None => break,
				},
			}
		}
		debug!("sensor control listener stopped");
	}

	async fn handle_config(simulator: &SensorSimulator, message: &Message) {
		let Some(sensor_id) = message.topic.segment(1) else {
			warn!(topic = %message.topic, "config message without sensor segment");
			return;
		};
		match payload::decode::<ConfigUpdate>(&message.payload) {
			| Ok(update) => {
				if let Err(err) =
					simulator.update_config(sensor_id, &update).await
				{
					warn!(sensor_id, error = %err, "config update rejected");
				}
			}
			| Err(err) => {
				warn!(
					topic = %message.topic,
					error = %err,
					"dropping malformed config payload"
				);
			}
		}
	}

	async fn handle_command(
		simulator: &SensorSimulator,
		message: &Message,
	) {
		let Some(sensor_id) = message.topic.segment(1) else {
			warn!(topic = %message.topic, "command message without sensor segment");
			return;
		};
		let command = match payload::decode::<SensorCommand>(
			&message.payload,
		) {
			| Ok(command) => command,
			| Err(err) => {
				warn!(
					topic = %message.topic,
					error = %err,
					"dropping malformed command payload"
				);
				return;
			}
		};
		let outcome = match command.action {
			| CommandAction::Start => {
				simulator.start_sensor(sensor_id).await
			}
			| CommandAction::Stop => simulator.stop_sensor(sensor_id).await,
			| CommandAction::Reset => simulator.reset_sensor(sensor_id),
		};
		if let Err(err) = outcome {
			warn!(sensor_id, action = ?command.action, error = %err, "command rejected");
		}
	}
}
