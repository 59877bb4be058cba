//! Concrete topic paths.

use std::fmt;

use arcstr::{ArcStr, Substr};

/// A concrete, fully-specified topic: `/`-separated segments, no wildcards.
///
/// Parsed once on construction; segments are cheap substrings of the shared
/// backing string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPath {
	path: ArcStr,
	segments: Vec<Substr>,
}

impl TopicPath {
	/// Parses a topic string into its segments.
	pub fn new(path: impl Into<ArcStr>) -> Self {
		let path = path.into();
		let segments: Vec<Substr> =
			path.split('/').map(|s| path.substr_from(s)).collect();
		Self { path, segments }
	}

	/// The full topic string.
	pub fn as_str(&self) -> &str {
		&self.path
	}

	/// Shared handle to the full topic string.
	pub fn path(&self) -> ArcStr {
		self.path.clone()
	}

	/// The parsed segments, in order.
	pub fn segments(&self) -> &[Substr] {
		&self.segments
	}

	/// Returns the segment at `index`, if present.
	pub fn segment(&self, index: usize) -> Option<&str> {
		self.segments.get(index).map(Substr::as_str)
	}
}

impl fmt::Display for TopicPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.path)
	}
}

impl From<&str> for TopicPath {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for TopicPath {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn splits_into_segments() {
		let topic = TopicPath::new("sensor/kitchen/data");
		assert_eq!(topic.segments().len(), 3);
		assert_eq!(topic.segment(0), Some("sensor"));
		assert_eq!(topic.segment(1), Some("kitchen"));
		assert_eq!(topic.segment(2), Some("data"));
		assert_eq!(topic.segment(3), None);
	}

	#[test]
	fn single_segment_topic() {
		let topic = TopicPath::new("liveness");
		assert_eq!(topic.segments().len(), 1);
		assert_eq!(topic.as_str(), "liveness");
	}
}
