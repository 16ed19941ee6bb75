//! Strongly typed identifiers for service resources.

// std
use std::{borrow::Borrow, num::ParseIntError, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_numeric_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "u64", into = "u64")]
		pub struct $name(u64);
		impl $name {
			/// Creates a new identifier; the service never issues zero.
			pub fn new(value: u64) -> Result<Self, IdentifierError> {
				if value == 0 {
					return Err(IdentifierError::Zero { kind: $kind });
				}

				Ok(Self(value))
			}

			/// Raw numeric value.
			pub const fn get(self) -> u64 {
				self.0
			}
		}
		impl From<$name> for u64 {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<u64> for $name {
			type Error = IdentifierError;

			fn try_from(value: u64) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				Display::fmt(&self.0, f)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				let value = s
					.parse::<u64>()
					.map_err(|e: ParseIntError| IdentifierError::NotNumeric {
						kind: $kind,
						reason: e.to_string(),
					})?;

				Self::new(value)
			}
		}
	};
}

const CONNECTION_ID_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// Numeric identifiers start at one.
	#[error("{kind} identifier cannot be zero.")]
	Zero {
		/// Kind of identifier (user, book, reading, highlight).
		kind: &'static str,
	},
	/// Textual form of a numeric identifier did not parse.
	#[error("{kind} identifier is not numeric: {reason}.")]
	NotNumeric {
		/// Kind of identifier.
		kind: &'static str,
		/// Parser message.
		reason: String,
	},
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier.
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier.
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier.
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_numeric_id! { UserId, "Service identifier of a user.", "User" }
def_numeric_id! { BookId, "Service identifier of a book.", "Book" }
def_numeric_id! { ReadingId, "Service identifier of a reading.", "Reading" }
def_numeric_id! { HighlightId, "Service identifier of a highlight.", "Highlight" }

/// Identifier of a sharing connection (a social target a reading can be posted to).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectionId(String);
impl ConnectionId {
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		validate_connection(view)?;

		Ok(Self(view.to_owned()))
	}
}
impl Deref for ConnectionId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for ConnectionId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for ConnectionId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<ConnectionId> for String {
	fn from(value: ConnectionId) -> Self {
		value.0
	}
}
impl TryFrom<String> for ConnectionId {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_connection(&value)?;

		Ok(Self(value))
	}
}
impl Debug for ConnectionId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Connection({})", self.0)
	}
}
impl Display for ConnectionId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

fn validate_connection(view: &str) -> Result<(), IdentifierError> {
	const KIND: &str = "Connection";

	if view.is_empty() {
		return Err(IdentifierError::Empty { kind: KIND });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind: KIND });
	}
	if view.len() > CONNECTION_ID_MAX_LEN {
		return Err(IdentifierError::TooLong { kind: KIND, max: CONNECTION_ID_MAX_LEN });
	}

	Ok(())
}
