//! Book records.

// self
use crate::{_prelude::*, auth::BookId};

/// A book as known to the service, or as drafted by the host before creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
	/// Remote identifier; `None` until the service has created the book.
	#[serde(default)]
	pub id: Option<BookId>,
	/// ISBN-like identifier, the strongest matching criterion.
	#[serde(default)]
	pub identifier: Option<String>,
	/// Display title.
	#[serde(default)]
	pub title: String,
	/// Display author.
	#[serde(default)]
	pub author: String,
	/// Public page on the service.
	#[serde(default, rename = "permalink_url")]
	pub permalink: Option<Url>,
}
impl Book {
	/// Returns the remote identifier, failing for books the service has not created yet.
	pub fn require_id(&self) -> Result<BookId> {
		self.id.ok_or_else(|| {
			Error::validation(format!("book `{}` has no remote identifier", self.title))
		})
	}
}

/// Body of `POST /books`.
#[derive(Debug, Serialize)]
pub(crate) struct NewBook<'a> {
	pub(crate) title: &'a str,
	pub(crate) author: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub(crate) identifier: Option<&'a str>,
}
