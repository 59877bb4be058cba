use std::collections::HashSet;

use rumqttc::QoS;

use super::path::TopicPath;
use super::pattern::TopicPattern;
use super::router::{RouterError, TopicRouter};

fn pattern(s: &str) -> TopicPattern {
	TopicPattern::parse(s).unwrap()
}

fn matched_tags<'a>(router: &'a TopicRouter<&'static str>, topic: &'a str) -> Vec<&'a str> {
	router
		.matches(&TopicPath::new(topic))
		.into_iter()
		.map(|(_, _, tag)| *tag)
		.collect()
}

#[test]
fn overlapping_patterns_each_invoked_exactly_once() {
	let mut router = TopicRouter::new();
	router.subscribe(pattern("sensor/+/data"), QoS::AtMostOnce, "plus");
	router.subscribe(pattern("sensor/#"), QoS::AtMostOnce, "hash");

	let tags: HashSet<&str> =
		matched_tags(&router, "sensor/a/data").into_iter().collect();
	assert_eq!(tags, HashSet::from(["plus", "hash"]));
	// exactly once each, no duplicates
	assert_eq!(matched_tags(&router, "sensor/a/data").len(), 2);

	// deeper topic only reaches the hash pattern
	assert_eq!(matched_tags(&router, "sensor/a/b/data"), vec!["hash"]);
}

#[test]
fn multiple_handlers_per_pattern() {
	let mut router = TopicRouter::new();
	router.subscribe(pattern("sensor/+/data"), QoS::AtMostOnce, "first");
	let (fresh, _) =
		router.subscribe(pattern("sensor/+/data"), QoS::AtMostOnce, "second");

	assert!(!fresh, "second handler must not report a fresh pattern");
	assert_eq!(router.pattern_count(), 1);
	assert_eq!(matched_tags(&router, "sensor/x/data").len(), 2);
}

#[test]
fn unsubscribe_removes_only_that_handler() {
	let mut router = TopicRouter::new();
	let (_, first) =
		router.subscribe(pattern("sensor/+/data"), QoS::AtMostOnce, "first");
	router.subscribe(pattern("sensor/+/data"), QoS::AtMostOnce, "second");

	router.unsubscribe(first).unwrap();
	assert_eq!(matched_tags(&router, "sensor/x/data"), vec!["second"]);
	assert_eq!(router.pattern_count(), 1);
}

#[test]
fn empty_pattern_entry_is_dropped() {
	let mut router = TopicRouter::new();
	let (fresh, id) =
		router.subscribe(pattern("sensor/+/data"), QoS::AtMostOnce, "only");
	assert!(fresh);

	router.unsubscribe(id).unwrap();
	assert_eq!(router.pattern_count(), 0);
	assert_eq!(router.handler_count(), 0);

	// re-subscribing the same pattern is fresh again
	let (fresh, _) =
		router.subscribe(pattern("sensor/+/data"), QoS::AtMostOnce, "again");
	assert!(fresh);
}

#[test]
fn unsubscribe_unknown_id_is_an_error() {
	let mut router: TopicRouter<&str> = TopicRouter::new();
	let (_, id) =
		router.subscribe(pattern("sensor/+/data"), QoS::AtMostOnce, "x");
	router.unsubscribe(id).unwrap();
	assert_eq!(
		router.unsubscribe(id),
		Err(RouterError::subscription_not_found(id))
	);
}

#[test]
fn wire_subscriptions_report_max_qos_per_pattern() {
	let mut router = TopicRouter::new();
	router.subscribe(pattern("sensor/+/data"), QoS::AtMostOnce, "a");
	router.subscribe(pattern("sensor/+/data"), QoS::ExactlyOnce, "b");
	router.subscribe(pattern("sensor/+/status"), QoS::AtLeastOnce, "c");

	let mut wire = router.wire_subscriptions();
	wire.sort_by(|(a, _), (b, _)| a.cmp(b));
	assert_eq!(wire.len(), 2);
	assert_eq!(wire[0].0.as_str(), "sensor/+/data");
	assert_eq!(wire[0].1, QoS::ExactlyOnce);
	assert_eq!(wire[1].0.as_str(), "sensor/+/status");
	assert_eq!(wire[1].1, QoS::AtLeastOnce);
}

#[test]
fn no_match_for_structurally_different_topic() {
	let mut router = TopicRouter::new();
	router.subscribe(pattern("sensor/+/data"), QoS::AtMostOnce, "only");
	assert!(matched_tags(&router, "sensor/a/b/data").is_empty());
	assert!(matched_tags(&router, "other/a/data").is_empty());
}
