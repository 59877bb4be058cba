//! Link handle and the actor driving the connection state machine.

use std::collections::HashSet;

use arcstr::ArcStr;
use bytes::Bytes;
use rumqttc::QoS;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::config::{LinkConfig, LIVENESS_OFFLINE, LIVENESS_ONLINE};
use super::error::LinkError;
use super::state::{LinkState, Transition};
use crate::routing::{MessageRouter, Subscription};
use crate::topic::TopicPattern;
use crate::transport::{
	ConnectionError, Message, Session, SessionEvent, Transport,
};

/// Per-publish options.
#[derive(Debug, Clone, Copy)]
pub struct PublishOptions {
	/// Requested delivery guarantee.
	pub qos: QoS,
	/// Ask the broker to retain the message.
	pub retain: bool,
}

impl Default for PublishOptions {
	fn default() -> Self {
		Self {
			qos: QoS::AtMostOnce,
			retain: false,
		}
	}
}

impl PublishOptions {
	/// Sets the QoS level.
	pub fn qos(mut self, qos: QoS) -> Self {
		self.qos = qos;
		self
	}

	/// Sets the retain flag.
	pub fn retain(mut self, retain: bool) -> Self {
		self.retain = retain;
		self
	}
}

enum Command {
	Connect,
	Disconnect(oneshot::Sender<()>),
	Publish(Message),
	WireSubscribe(ArcStr, QoS),
}

/// Handle to the shared broker link.
///
/// Explicitly constructed and explicitly owned: clones are cheap and all
/// address the same actor, so every component receives its handle from
/// whoever wired the process together; there is no implicit singleton.
#[derive(Clone)]
pub struct BrokerLink {
	commands: mpsc::Sender<Command>,
	state: watch::Receiver<LinkState>,
	transitions: broadcast::Sender<Transition>,
	router: MessageRouter,
}

impl BrokerLink {
	/// Spawns the link actor over `transport`. The link starts
	/// `Disconnected`; call [`BrokerLink::connect`] to bring it up.
	pub fn new(transport: impl Transport, config: LinkConfig) -> Self {
		let (commands_tx, commands_rx) =
			mpsc::channel(config.command_capacity);
		let (state_tx, state_rx) = watch::channel(LinkState::Disconnected);
		let (transitions_tx, _) =
			broadcast::channel(config.transition_capacity);
		let router = MessageRouter::new(config.subscriber_capacity);

		let actor = LinkActor {
			transport,
			config,
			router: router.clone(),
			commands: commands_rx,
			state: state_tx,
			transitions: transitions_tx.clone(),
			wire_subscriptions: HashSet::new(),
		};
		tokio::spawn(actor.run());

		Self {
			commands: commands_tx,
			state: state_rx,
			transitions: transitions_tx,
			router,
		}
	}

	/// Requests connection establishment.
	///
	/// Idempotent: while the link is already connecting, connected or
	/// reconnecting the request is a logged no-op.
	pub async fn connect(&self) -> Result<(), LinkError> {
		self.commands
			.send(Command::Connect)
			.await
			.map_err(|_| LinkError::Closed)
	}

	/// Tears the session down and parks the link in `Disconnected`.
	///
	/// Cancels any pending reconnect attempt and clears the link's
	/// wire-subscription bookkeeping; the router's pattern table is left
	/// intact. Returns once no further work from the link is observable.
	pub async fn disconnect(&self) -> Result<(), LinkError> {
		let (ack_tx, ack_rx) = oneshot::channel();
		self.commands
			.send(Command::Disconnect(ack_tx))
			.await
			.map_err(|_| LinkError::Closed)?;
		ack_rx.await.map_err(|_| LinkError::Closed)
	}

	/// Publishes `payload` to `topic`.
	///
	/// Fails with [`LinkError::NotConnected`] unless the link is
	/// `Connected`; otherwise the publish is handed to the actor
	/// fire-and-forget (nothing beyond transport QoS is tracked).
	pub async fn publish(
		&self,
		topic: &str,
		payload: impl Into<Bytes>,
		options: PublishOptions,
	) -> Result<(), LinkError> {
		if !self.state().is_connected() {
			return Err(LinkError::NotConnected);
		}
		let message = Message::new(topic, payload.into(), options.qos)
			.retain(options.retain);
		self.commands
			.send(Command::Publish(message))
			.await
			.map_err(|_| LinkError::Closed)
	}

	/// Registers a subscriber for `pattern`.
	///
	/// The pattern survives reconnects (and full disconnects) until the
	/// returned handle is dropped or unsubscribed. A fresh pattern
	/// triggers one wire-level subscribe when a session is up.
	pub async fn subscribe(
		&self,
		pattern: &str,
		qos: QoS,
	) -> Result<Subscription, LinkError> {
		let pattern = TopicPattern::parse(pattern)?;
		let pattern_str = pattern.pattern();
		let (fresh, subscription) = self.router.subscribe(pattern, qos);
		if fresh {
			// ignored by the actor while no session is up; the router's
			// table is replayed on every (re)connect anyway
			self.commands
				.send(Command::WireSubscribe(pattern_str, qos))
				.await
				.map_err(|_| LinkError::Closed)?;
		}
		Ok(subscription)
	}

	/// Current lifecycle state.
	pub fn state(&self) -> LinkState {
		*self.state.borrow()
	}

	/// Subscribes to the transition log.
	pub fn transitions(&self) -> broadcast::Receiver<Transition> {
		self.transitions.subscribe()
	}

	/// Waits until the link reaches `target`.
	pub async fn wait_for(&self, target: LinkState) -> Result<(), LinkError> {
		let mut state = self.state.clone();
		state
			.wait_for(|current| *current == target)
			.await
			.map(|_| ())
			.map_err(|_| LinkError::Closed)
	}

	/// The shared subscription table.
	pub fn router(&self) -> &MessageRouter {
		&self.router
	}
}

enum Phase {
	/// Disconnected, waiting for a connect request.
	Idle,
	/// One connection attempt in flight. `first` distinguishes the
	/// initial `Connecting` attempt from `Reconnecting` retries.
	Establish { first: bool },
	/// Live session being served.
	Online(Box<dyn Session>),
	/// Command channel closed; actor exits.
	Halted,
}

struct LinkActor<T: Transport> {
	transport: T,
	config: LinkConfig,
	router: MessageRouter,
	commands: mpsc::Receiver<Command>,
	state: watch::Sender<LinkState>,
	transitions: broadcast::Sender<Transition>,
	wire_subscriptions: HashSet<ArcStr>,
}

impl<T: Transport> LinkActor<T> {
	async fn run(mut self) {
		let mut phase = Phase::Idle;
		loop {
			phase = match phase {
				| Phase::Idle => self.idle().await,
				| Phase::Establish { first } => self.establish(first).await,
				| Phase::Online(session) => self.online(session).await,
				| Phase::Halted => break,
			};
		}
		info!("broker link actor terminated");
	}

	fn transition(&mut self, to: LinkState) {
		let from = *self.state.borrow();
		if from == to {
			return;
		}
		info!(%from, %to, "link state transition");
		let _ = self.state.send(to);
		let _ = self.transitions.send(Transition { from, to });
	}

	async fn idle(&mut self) -> Phase {
		loop {
			match self.commands.recv().await {
				| None => return Phase::Halted,
				| Some(Command::Connect) => {
					self.transition(LinkState::Connecting);
					return Phase::Establish { first: true };
				}
				| Some(Command::Disconnect(ack)) => {
					// already disconnected
					let _ = ack.send(());
				}
				| Some(Command::Publish(message)) => {
					warn!(topic = %message.topic, "dropping publish, link disconnected");
				}
				| Some(Command::WireSubscribe(..)) => {
					// replayed from the router table on connect
				}
			}
		}
	}

	async fn establish(&mut self, first: bool) -> Phase {
		match self.try_connect().await {
			| Ok(mut session) => {
				// subscriptions and liveness are in place before the
				// Connected state becomes observable
				match self.bring_online(session.as_mut()).await {
					| Ok(()) => {
						self.transition(LinkState::Connected);
						Phase::Online(session)
					}
					| Err(err) => {
						warn!(error = %err, "session setup failed after connect");
						self.wire_subscriptions.clear();
						self.transition(LinkState::Reconnecting);
						self.backoff_then_retry().await
					}
				}
			}
			| Err(err) => {
				warn!(error = %err, "connection attempt failed");
				if first {
					self.transition(LinkState::Reconnecting);
				}
				self.backoff_then_retry().await
			}
		}
	}

	async fn try_connect(
		&mut self,
	) -> Result<Box<dyn Session>, ConnectionError> {
		let options = self.config.connect_options();
		match tokio::time::timeout(
			self.config.connect_timeout,
			self.transport.connect(&options),
		)
		.await
		{
			| Ok(result) => result,
			| Err(_) => Err(ConnectionError::Timeout {
				timeout: self.config.connect_timeout,
			}),
		}
	}

	/// Replays the router's pattern table onto the fresh session and
	/// announces liveness.
	async fn bring_online(
		&mut self,
		session: &mut dyn Session,
	) -> Result<(), ConnectionError> {
		self.wire_subscriptions.clear();
		for (pattern, qos) in self.router.wire_subscriptions() {
			session.subscribe(&pattern, qos).await?;
			debug!(pattern = %pattern, "wire subscription restored");
			self.wire_subscriptions.insert(pattern);
		}
		session
			.publish(
				Message::new(
					self.config.liveness_topic.as_str(),
					Bytes::from_static(LIVENESS_ONLINE),
					QoS::AtLeastOnce,
				)
				.retain(true),
			)
			.await
	}

	/// Fixed-interval wait before the next attempt, interruptible by
	/// disconnect or shutdown. Exactly one attempt is ever in flight.
	async fn backoff_then_retry(&mut self) -> Phase {
		let sleep = tokio::time::sleep(self.config.reconnect_interval);
		tokio::pin!(sleep);
		loop {
			tokio::select! {
				_ = &mut sleep => return Phase::Establish { first: false },
				cmd = self.commands.recv() => match cmd {
					| None => return Phase::Halted,
					| Some(Command::Disconnect(ack)) => {
						self.transition(LinkState::Disconnected);
						let _ = ack.send(());
						return Phase::Idle;
					}
					| Some(Command::Connect) => {
						debug!("connect requested while reconnecting, ignored");
					}
					| Some(Command::Publish(message)) => {
						warn!(topic = %message.topic, "dropping publish, link reconnecting");
					}
					| Some(Command::WireSubscribe(..)) => {}
				}
			}
		}
	}

	async fn online(&mut self, mut session: Box<dyn Session>) -> Phase {
		loop {
			tokio::select! {
				event = session.next_event() => match event {
					| SessionEvent::Message(message) => {
						self.router.route(&message);
					}
					| SessionEvent::Disconnected(err) => {
						warn!(error = %err, "broker session lost");
						return self.session_lost().await;
					}
				},
				cmd = self.commands.recv() => match cmd {
					| None => {
						let _ = session.close().await;
						return Phase::Halted;
					}
					| Some(Command::Connect) => {
						debug!("connect requested while connected, ignored");
					}
					| Some(Command::Disconnect(ack)) => {
						self.shutdown_session(session.as_mut()).await;
						self.transition(LinkState::Disconnected);
						let _ = ack.send(());
						return Phase::Idle;
					}
					| Some(Command::Publish(message)) => {
						if let Err(err) = session.publish(message).await {
							warn!(error = %err, "publish failed, session lost");
							return self.session_lost().await;
						}
					}
					| Some(Command::WireSubscribe(pattern, qos)) => {
						if self.wire_subscriptions.contains(&pattern) {
							continue;
						}
						match session.subscribe(&pattern, qos).await {
							| Ok(()) => {
								self.wire_subscriptions.insert(pattern);
							}
							| Err(err) => {
								warn!(
									error = %err,
									pattern = %pattern,
									"wire subscribe failed, session lost"
								);
								return self.session_lost().await;
							}
						}
					}
				}
			}
		}
	}

	async fn session_lost(&mut self) -> Phase {
		self.wire_subscriptions.clear();
		self.transition(LinkState::Reconnecting);
		self.backoff_then_retry().await
	}

	/// Clean teardown: announce offline (the clean close suppresses the
	/// last will, so the retained liveness must be flipped here), then
	/// close the session and drop wire bookkeeping.
	async fn shutdown_session(&mut self, session: &mut dyn Session) {
		let offline = Message::new(
			self.config.liveness_topic.as_str(),
			Bytes::from_static(LIVENESS_OFFLINE),
			QoS::AtLeastOnce,
		)
		.retain(true);
		if let Err(err) = session.publish(offline).await {
			debug!(error = %err, "offline announcement failed during disconnect");
		}
		if let Err(err) = session.close().await {
			debug!(error = %err, "session close failed");
		}
		self.wire_subscriptions.clear();
	}
}
