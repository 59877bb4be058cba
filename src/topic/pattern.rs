//! Subscription pattern parsing and structural matching.
//!
//! Matching is a plain left-to-right segment comparison with no networking
//! involvement, so it can be exercised exhaustively in unit tests.

use std::convert::TryFrom;
use std::fmt;

use arcstr::{ArcStr, Substr};
use thiserror::Error;

use super::path::TopicPath;

/// Errors raised while parsing a subscription pattern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
	/// Pattern string was empty or all whitespace.
	#[error("topic pattern cannot be empty")]
	Empty,

	/// A pattern segment was empty (`a//b`).
	#[error("invalid topic pattern '{pattern}': empty segment")]
	EmptySegment {
		/// The offending pattern.
		pattern: String,
	},

	/// `#` used anywhere but as the final segment.
	#[error(
		"invalid topic pattern '{pattern}': # wildcard can only be the last \
		 segment"
	)]
	MultiLevelPosition {
		/// The offending pattern.
		pattern: String,
	},

	/// `#` used without at least one preceding segment.
	#[error(
		"invalid topic pattern '{pattern}': # wildcard requires a preceding \
		 segment"
	)]
	BareMultiLevel {
		/// The offending pattern.
		pattern: String,
	},

	/// Wildcard character embedded inside a literal segment (`a+b`).
	#[error("invalid wildcard usage in segment '{segment}'")]
	EmbeddedWildcard {
		/// The offending segment.
		segment: String,
	},
}

impl PatternError {
	pub(crate) fn empty_segment(pattern: impl Into<String>) -> Self {
		Self::EmptySegment {
			pattern: pattern.into(),
		}
	}

	pub(crate) fn multi_level_position(pattern: impl Into<String>) -> Self {
		Self::MultiLevelPosition {
			pattern: pattern.into(),
		}
	}

	pub(crate) fn bare_multi_level(pattern: impl Into<String>) -> Self {
		Self::BareMultiLevel {
			pattern: pattern.into(),
		}
	}

	pub(crate) fn embedded_wildcard(segment: impl Into<String>) -> Self {
		Self::EmbeddedWildcard {
			segment: segment.into(),
		}
	}
}

/// One parsed pattern segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternSegment {
	/// Literal segment, matches only an identical topic segment.
	Literal(Substr),
	/// `+`: matches exactly one concrete segment.
	SingleLevel,
	/// `#`: matches zero or more trailing segments; final position only.
	MultiLevel,
}

impl PatternSegment {
	/// Wire representation of the segment.
	pub fn as_str(&self) -> &str {
		match self {
			| PatternSegment::Literal(s) => s,
			| PatternSegment::SingleLevel => "+",
			| PatternSegment::MultiLevel => "#",
		}
	}
}

impl TryFrom<Substr> for PatternSegment {
	type Error = PatternError;

	fn try_from(segment: Substr) -> Result<Self, Self::Error> {
		match segment.as_str() {
			| "+" => Ok(PatternSegment::SingleLevel),
			| "#" => Ok(PatternSegment::MultiLevel),
			| s if s.contains(['+', '#']) => {
				Err(PatternError::embedded_wildcard(s))
			}
			| _ => Ok(PatternSegment::Literal(segment)),
		}
	}
}

/// A parsed subscription pattern.
///
/// Supports the single-level wildcard `+` in any position and the
/// multi-level wildcard `#` as the final segment of a multi-segment
/// pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
	pattern: ArcStr,
	segments: Vec<PatternSegment>,
}

impl TopicPattern {
	/// Parses and validates a pattern string.
	pub fn parse(pattern: impl Into<ArcStr>) -> Result<Self, PatternError> {
		let pattern = pattern.into();
		if pattern.trim().is_empty() {
			return Err(PatternError::Empty);
		}

		let segments: Result<Vec<_>, _> = pattern
			.split('/')
			.map(|s| pattern.substr_from(s))
			.map(PatternSegment::try_from)
			.collect();
		let segments = segments?;

		if segments.iter().any(|s| {
			matches!(s, PatternSegment::Literal(lit) if lit.is_empty())
		}) {
			return Err(PatternError::empty_segment(pattern.as_str()));
		}

		if let Some(pos) = segments
			.iter()
			.position(|s| matches!(s, PatternSegment::MultiLevel))
		{
			if pos != segments.len() - 1 {
				return Err(PatternError::multi_level_position(
					pattern.as_str(),
				));
			}
			if pos == 0 {
				return Err(PatternError::bare_multi_level(pattern.as_str()));
			}
		}

		Ok(Self { pattern, segments })
	}

	/// The wire-level pattern string (what gets sent in a SUBSCRIBE).
	pub fn as_str(&self) -> &str {
		&self.pattern
	}

	/// Shared handle to the pattern string.
	pub fn pattern(&self) -> ArcStr {
		self.pattern.clone()
	}

	/// The parsed segments, in order.
	pub fn segments(&self) -> &[PatternSegment] {
		&self.segments
	}

	/// Returns true if the final segment is the multi-level wildcard.
	pub fn has_multi_level(&self) -> bool {
		matches!(self.segments.last(), Some(PatternSegment::MultiLevel))
	}

	/// Structural match of a concrete topic against this pattern.
	///
	/// Segment-wise comparison, left to right: a literal matches only an
	/// identical segment, `+` consumes exactly one segment, a trailing `#`
	/// absorbs everything that remains (including nothing). Differing
	/// segment counts never match except through `#`.
	pub fn matches(&self, topic: &TopicPath) -> bool {
		let segments = topic.segments();
		let mut index = 0;

		for item in &self.segments {
			match item {
				| PatternSegment::Literal(expected) => {
					match segments.get(index) {
						| Some(actual) if actual == expected => index += 1,
						| _ => return false,
					}
				}
				| PatternSegment::SingleLevel => {
					if index >= segments.len() {
						return false;
					}
					index += 1;
				}
				| PatternSegment::MultiLevel => return true,
			}
		}

		index == segments.len()
	}
}

impl fmt::Display for TopicPattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.pattern)
	}
}

impl TryFrom<&str> for TopicPattern {
	type Error = PatternError;

	fn try_from(value: &str) -> Result<Self, Self::Error> {
		Self::parse(value)
	}
}

impl TryFrom<String> for TopicPattern {
	type Error = PatternError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(value)
	}
}
