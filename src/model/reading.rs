//! Reading records: one per (user, book) pair.

// self
use crate::{
	_prelude::*,
	auth::{BookId, ConnectionId, ReadingId, UserId},
};

/// Where the user is with a book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingState {
	/// Flagged as worth reading later.
	Interesting,
	/// Currently being read.
	Reading,
	/// Read to the end.
	Finished,
	/// Given up on.
	Abandoned,
}
impl ReadingState {
	/// Wire label.
	pub const fn as_str(self) -> &'static str {
		match self {
			ReadingState::Interesting => "interesting",
			ReadingState::Reading => "reading",
			ReadingState::Finished => "finished",
			ReadingState::Abandoned => "abandoned",
		}
	}
}
impl Display for ReadingState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// A user's relationship to one book.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
	/// Remote identifier.
	pub id: ReadingId,
	/// Owning user, when the service reports it.
	#[serde(default)]
	pub user_id: Option<UserId>,
	/// Book the reading belongs to.
	pub book_id: BookId,
	/// Reading state as stored by the service.
	pub state: ReadingState,
	/// Whether the reading is hidden from other users.
	#[serde(default, rename = "private")]
	pub is_private: bool,
	/// Sharing connections the reading is posted to.
	#[serde(default)]
	pub connections: Vec<ConnectionId>,
	/// Public page on the service.
	#[serde(default, rename = "permalink_url")]
	pub permalink: Option<Url>,
}

/// Body of `POST /books/{id}/readings`.
#[derive(Debug, Serialize)]
pub(crate) struct NewReading<'a> {
	pub(crate) state: ReadingState,
	pub(crate) private: bool,
	/// `None` lets the service apply the user's default connections.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub(crate) connections: Option<&'a [ConnectionId]>,
}
