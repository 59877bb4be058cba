//! Link lifecycle tests driven entirely through the in-process broker.

use std::time::Duration;

use bytes::Bytes;
use telemetry_hub::transport::memory::MemoryBroker;
use telemetry_hub::{
	BrokerLink, LinkConfig, LinkError, LinkState, PublishOptions, QoS,
	Transition,
};
use tokio::time::timeout;

fn test_link(broker: &MemoryBroker, client_id: &str) -> BrokerLink {
	BrokerLink::new(broker.transport(), LinkConfig::new(client_id))
}

async fn next_transition(
	log: &mut tokio::sync::broadcast::Receiver<Transition>,
) -> Transition {
	timeout(Duration::from_secs(5), log.recv())
		.await
		.expect("transition log timed out")
		.expect("transition log closed")
}

#[tokio::test(start_paused = true)]
async fn connect_walks_through_connecting_to_connected() {
	let broker = MemoryBroker::new();
	let link = test_link(&broker, "node-a");
	let mut log = link.transitions();

	assert_eq!(link.state(), LinkState::Disconnected);
	link.connect().await.unwrap();
	link.wait_for(LinkState::Connected).await.unwrap();

	let first = next_transition(&mut log).await;
	assert_eq!(first.from, LinkState::Disconnected);
	assert_eq!(first.to, LinkState::Connecting);
	let second = next_transition(&mut log).await;
	assert_eq!(second.from, LinkState::Connecting);
	assert_eq!(second.to, LinkState::Connected);
}

#[tokio::test(start_paused = true)]
async fn connect_is_idempotent_while_connected() {
	let broker = MemoryBroker::new();
	let link = test_link(&broker, "node-a");
	link.connect().await.unwrap();
	link.wait_for(LinkState::Connected).await.unwrap();
	let mut log = link.transitions();

	// repeated connects are logged no-ops, not new attempts
	link.connect().await.unwrap();
	link.connect().await.unwrap();
	tokio::time::sleep(Duration::from_millis(100)).await;
	assert_eq!(link.state(), LinkState::Connected);
	assert!(log.try_recv().is_err(), "no transition expected");
	assert_eq!(broker.connected_clients().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn publish_while_disconnected_is_rejected() {
	let broker = MemoryBroker::new();
	let link = test_link(&broker, "node-a");

	let result = link
		.publish(
			"sensor/a/data",
			Bytes::from_static(b"{}"),
			PublishOptions::default(),
		)
		.await;
	assert_eq!(result, Err(LinkError::NotConnected));
}

#[tokio::test(start_paused = true)]
async fn liveness_is_retained_online_and_will_flips_it_offline() {
	let broker = MemoryBroker::new();
	let link = test_link(&broker, "node-a");
	link.connect().await.unwrap();
	link.wait_for(LinkState::Connected).await.unwrap();

	assert_eq!(
		broker.retained_payload("liveness"),
		Some(Bytes::from_static(b"online"))
	);

	// unclean drop: the broker publishes the registered will
	broker.sever_all();
	assert_eq!(
		broker.retained_payload("liveness"),
		Some(Bytes::from_static(b"offline"))
	);

	// the reconnect announces liveness again
	link.wait_for(LinkState::Connected).await.unwrap();
	assert_eq!(
		broker.retained_payload("liveness"),
		Some(Bytes::from_static(b"online"))
	);
}

#[tokio::test(start_paused = true)]
async fn clean_disconnect_announces_offline() {
	let broker = MemoryBroker::new();
	let link = test_link(&broker, "node-a");
	link.connect().await.unwrap();
	link.wait_for(LinkState::Connected).await.unwrap();

	link.disconnect().await.unwrap();
	assert_eq!(link.state(), LinkState::Disconnected);
	assert_eq!(
		broker.retained_payload("liveness"),
		Some(Bytes::from_static(b"offline"))
	);
	assert!(broker.connected_clients().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reconnects_once_and_restores_subscriptions() {
	let broker = MemoryBroker::new();
	let link = test_link(&broker, "node-a");
	link.connect().await.unwrap();
	link.wait_for(LinkState::Connected).await.unwrap();

	let mut sub = link
		.subscribe("sensor/+/data", QoS::AtMostOnce)
		.await
		.unwrap();

	// round-trip to be sure the wire subscription is active
	link.publish(
		"sensor/a/data",
		Bytes::from_static(b"{}"),
		PublishOptions::default(),
	)
	.await
	.unwrap();
	timeout(Duration::from_secs(1), sub.recv())
		.await
		.expect("pre-drop delivery timed out")
		.expect("subscription closed");

	let mut log = link.transitions();
	broker.sever_all();

	let lost = next_transition(&mut log).await;
	assert_eq!(lost.from, LinkState::Connected);
	assert_eq!(lost.to, LinkState::Reconnecting);
	let recovered = next_transition(&mut log).await;
	assert_eq!(recovered.from, LinkState::Reconnecting);
	assert_eq!(recovered.to, LinkState::Connected);

	// a message published post-reconnect reaches the handler registered
	// pre-disconnect
	link.publish(
		"sensor/b/data",
		Bytes::from_static(b"{}"),
		PublishOptions::default(),
	)
	.await
	.unwrap();
	let delivered = timeout(Duration::from_secs(1), sub.recv())
		.await
		.expect("post-reconnect delivery timed out")
		.expect("subscription closed");
	assert_eq!(delivered.topic.as_str(), "sensor/b/data");

	// exactly one recovery: nothing further in the log
	assert!(log.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn retries_on_fixed_interval_until_broker_returns() {
	let broker = MemoryBroker::new();
	let link = test_link(&broker, "node-a");
	link.connect().await.unwrap();
	link.wait_for(LinkState::Connected).await.unwrap();

	broker.set_online(false);
	broker.sever_all();
	link.wait_for(LinkState::Reconnecting).await.unwrap();

	// several failed attempts pass while the broker stays down
	tokio::time::sleep(Duration::from_secs(5)).await;
	assert_eq!(link.state(), LinkState::Reconnecting);

	broker.set_online(true);
	link.wait_for(LinkState::Connected).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_reconnect() {
	let broker = MemoryBroker::new();
	let link = test_link(&broker, "node-a");
	link.connect().await.unwrap();
	link.wait_for(LinkState::Connected).await.unwrap();

	broker.set_online(false);
	broker.sever_all();
	link.wait_for(LinkState::Reconnecting).await.unwrap();

	link.disconnect().await.unwrap();
	assert_eq!(link.state(), LinkState::Disconnected);

	// no stray attempt fires afterwards
	broker.set_online(true);
	tokio::time::sleep(Duration::from_secs(10)).await;
	assert_eq!(link.state(), LinkState::Disconnected);
	assert!(broker.connected_clients().is_empty());
}

#[tokio::test(start_paused = true)]
async fn pattern_table_survives_full_disconnect() {
	let broker = MemoryBroker::new();
	let link = test_link(&broker, "node-a");
	link.connect().await.unwrap();
	link.wait_for(LinkState::Connected).await.unwrap();

	let mut sub = link
		.subscribe("sensor/+/data", QoS::AtMostOnce)
		.await
		.unwrap();

	link.disconnect().await.unwrap();
	link.connect().await.unwrap();
	link.wait_for(LinkState::Connected).await.unwrap();

	link.publish(
		"sensor/a/data",
		Bytes::from_static(b"{}"),
		PublishOptions::default(),
	)
	.await
	.unwrap();
	let delivered = timeout(Duration::from_secs(1), sub.recv())
		.await
		.expect("delivery after reconnect timed out")
		.expect("subscription closed");
	assert_eq!(delivered.topic.as_str(), "sensor/a/data");
}

#[tokio::test(start_paused = true)]
async fn invalid_pattern_is_rejected_at_subscribe() {
	let broker = MemoryBroker::new();
	let link = test_link(&broker, "node-a");
	let result = link.subscribe("sensor/#/data", QoS::AtMostOnce).await;
	assert!(matches!(result, Err(LinkError::Pattern(_))));
}
