//! rumqttc-backed transport for real MQTT brokers.
//!
//! A session is established by polling the event loop until the broker's
//! `ConnAck`; after that a pump task forwards incoming publishes into the
//! session's event channel so `next_event` stays cancel-safe.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::Event::{Incoming, Outgoing};
use rumqttc::{
	AsyncClient, ConnAck, ConnectReturnCode, EventLoop,
	LastWill as MqttLastWill, MqttOptions, Packet, QoS,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::{
	ConnectOptions, ConnectionError, Message, Session, SessionEvent,
	Transport,
};
use crate::topic::TopicPath;

/// Capacity of the pump-to-session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Transport speaking MQTT over TCP via rumqttc.
#[derive(Debug, Clone)]
pub struct RumqttTransport {
	host: String,
	port: u16,
	event_loop_capacity: usize,
}

impl RumqttTransport {
	/// Transport for the broker at `host:port`.
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self {
			host: host.into(),
			port,
			event_loop_capacity: 10,
		}
	}

	/// Overrides the rumqttc request channel capacity.
	pub fn with_event_loop_capacity(mut self, capacity: usize) -> Self {
		self.event_loop_capacity = capacity;
		self
	}
}

#[async_trait]
impl Transport for RumqttTransport {
	async fn connect(
		&self,
		options: &ConnectOptions,
	) -> Result<Box<dyn Session>, ConnectionError> {
		let mut mqtt_options = MqttOptions::new(
			options.client_id.as_str(),
			&self.host,
			self.port,
		);
		mqtt_options.set_keep_alive(options.keep_alive);
		mqtt_options.set_clean_session(options.clean_session);
		if let Some(will) = &options.last_will {
			mqtt_options.set_last_will(MqttLastWill::new(
				will.topic.as_str(),
				will.payload.to_vec(),
				will.qos,
				will.retain,
			));
		}

		let (client, event_loop) =
			AsyncClient::new(mqtt_options, self.event_loop_capacity);
		let event_loop = establish(event_loop).await?;

		let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
		let pump = tokio::spawn(pump(event_loop, events_tx));
		Ok(Box::new(RumqttSession {
			client,
			events: events_rx,
			pump,
		}))
	}
}

/// Polls the fresh event loop up to the broker's connection verdict.
async fn establish(
	mut event_loop: EventLoop,
) -> Result<EventLoop, ConnectionError> {
	loop {
		match event_loop.poll().await {
			| Ok(Incoming(Packet::ConnAck(ConnAck { code, .. }))) => {
				if code == ConnectReturnCode::Success {
					debug!("mqtt session established");
					return Ok(event_loop);
				}
				return Err(ConnectionError::rejected(format!("{code:?}")));
			}
			| Ok(notification) => {
				trace!(notification = ?notification, "bootstrap notification");
			}
			| Err(err) => {
				return Err(ConnectionError::unavailable(err.to_string()));
			}
		}
	}
}

/// Forwards event-loop notifications into the session channel until the
/// session ends one way or another.
async fn pump(
	mut event_loop: EventLoop,
	events: mpsc::Sender<SessionEvent>,
) {
	loop {
		match event_loop.poll().await {
			| Ok(Incoming(Packet::Publish(publish))) => {
				let message = Message {
					topic: TopicPath::new(publish.topic.as_str()),
					payload: publish.payload,
					retain: publish.retain,
					qos: publish.qos,
				};
				if events.send(SessionEvent::Message(message)).await.is_err()
				{
					break;
				}
			}
			| Ok(Incoming(Packet::Disconnect)) => {
				let _ = events
					.send(SessionEvent::Disconnected(
						ConnectionError::session_closed(
							"broker sent disconnect",
						),
					))
					.await;
				break;
			}
			| Ok(Outgoing(rumqttc::Outgoing::Disconnect)) => {
				// clean client-side close; the session owner already knows
				break;
			}
			| Ok(notification) => {
				trace!(notification = ?notification, "mqtt notification");
			}
			| Err(err) => {
				let _ = events
					.send(SessionEvent::Disconnected(
						ConnectionError::session_closed(err.to_string()),
					))
					.await;
				break;
			}
		}
	}
	debug!("mqtt event pump terminated");
}

struct RumqttSession {
	client: AsyncClient,
	events: mpsc::Receiver<SessionEvent>,
	pump: JoinHandle<()>,
}

#[async_trait]
impl Session for RumqttSession {
	async fn publish(
		&mut self,
		message: Message,
	) -> Result<(), ConnectionError> {
		self.client
			.publish(
				message.topic.as_str(),
				message.qos,
				message.retain,
				message.payload.to_vec(),
			)
			.await
			.map_err(|err| ConnectionError::session_closed(err.to_string()))
	}

	async fn subscribe(
		&mut self,
		pattern: &str,
		qos: QoS,
	) -> Result<(), ConnectionError> {
		self.client
			.subscribe(pattern, qos)
			.await
			.map_err(|err| ConnectionError::session_closed(err.to_string()))
	}

	async fn next_event(&mut self) -> SessionEvent {
		match self.events.recv().await {
			| Some(event) => event,
			| None => SessionEvent::Disconnected(
				ConnectionError::session_closed("event pump terminated"),
			),
		}
	}

	async fn close(&mut self) -> Result<(), ConnectionError> {
		if let Err(err) = self.client.disconnect().await {
			warn!(error = %err, "mqtt disconnect request failed");
		}
		// let the pump drain the outgoing disconnect, then stop waiting
		if tokio::time::timeout(Duration::from_secs(2), &mut self.pump)
			.await
			.is_err()
		{
			self.pump.abort();
		}
		Ok(())
	}
}

impl Drop for RumqttSession {
	fn drop(&mut self) {
		self.pump.abort();
	}
}
