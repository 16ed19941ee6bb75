//! Highlight snapshots and the iterator handed back by range queries.

// std
use std::vec::IntoIter;
// self
use crate::{
	_prelude::*,
	auth::{HighlightId, ReadingId},
};

/// Immutable content snapshot taken while reading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
	/// Remote identifier.
	pub id: HighlightId,
	/// Reading the highlight was made in.
	#[serde(default)]
	pub reading_id: Option<ReadingId>,
	/// Highlighted text.
	pub content: String,
	/// Moment the highlight was made.
	#[serde(with = "time::serde::rfc3339")]
	pub highlighted_at: OffsetDateTime,
	/// Position in the book, as a fraction between 0 and 1.
	#[serde(default)]
	pub position: Option<f64>,
	/// Public page on the service.
	#[serde(default, rename = "permalink_url")]
	pub permalink: Option<Url>,
}

/// Finite, non-restartable sequence of highlights, most recent first.
#[derive(Debug)]
pub struct Highlights(IntoIter<Highlight>);
impl Highlights {
	/// An empty sequence.
	pub fn empty() -> Self {
		Self(Vec::new().into_iter())
	}

	/// Whether the sequence has no highlights left.
	pub fn is_empty(&self) -> bool {
		self.0.len() == 0
	}

	/// Keeps highlights made in `[from, to)`, orders them most recent first, and caps the
	/// sequence at `count` items.
	pub(crate) fn bounded(
		mut items: Vec<Highlight>,
		count: usize,
		from: OffsetDateTime,
		to: OffsetDateTime,
	) -> Self {
		items.retain(|highlight| highlight.highlighted_at >= from && highlight.highlighted_at < to);
		items.sort_by(|a, b| b.highlighted_at.cmp(&a.highlighted_at));
		items.truncate(count);

		Self(items.into_iter())
	}
}
impl Iterator for Highlights {
	type Item = Highlight;

	fn next(&mut self) -> Option<Self::Item> {
		self.0.next()
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.0.size_hint()
	}
}
impl ExactSizeIterator for Highlights {}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn highlight(id: u64, at: OffsetDateTime) -> Highlight {
		Highlight {
			id: HighlightId::new(id).expect("Highlight fixture id should be valid."),
			reading_id: None,
			content: format!("passage {id}"),
			highlighted_at: at,
			position: None,
			permalink: None,
		}
	}

	#[test]
	fn bounded_filters_orders_and_truncates() {
		let from = macros::datetime!(2012-01-01 00:00 UTC);
		let to = macros::datetime!(2012-02-01 00:00 UTC);
		let items = vec![
			highlight(1, macros::datetime!(2012-01-02 00:00 UTC)),
			highlight(2, macros::datetime!(2012-01-20 00:00 UTC)),
			highlight(3, to),
			highlight(4, macros::datetime!(2012-01-10 00:00 UTC)),
			highlight(5, macros::datetime!(2011-12-31 23:59 UTC)),
		];
		let mut highlights = Highlights::bounded(items, 2, from, to);

		assert_eq!(highlights.len(), 2);
		assert_eq!(highlights.next().map(|h| h.id.get()), Some(2));
		assert_eq!(highlights.next().map(|h| h.id.get()), Some(4));
		assert!(highlights.next().is_none());
		assert!(highlights.next().is_none());
	}

	#[test]
	fn wire_record_uses_rfc3339_timestamps() {
		let highlight: Highlight = serde_json::from_str(
			r#"{"id":9,"reading_id":5,"content":"Fear is the mind-killer.","highlighted_at":"2012-01-05T10:00:00Z","position":0.12}"#,
		)
		.expect("Highlight record should decode.");

		assert_eq!(highlight.highlighted_at, macros::datetime!(2012-01-05 10:00 UTC));
		assert_eq!(highlight.position, Some(0.12));
	}
}
