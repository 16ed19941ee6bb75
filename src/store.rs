//! Flat, persistable form of a [`Credential`].
//!
//! The host owns the storage medium (keychain, preferences file, database row). The SDK only
//! converts between a live [`Credential`] and a [`CredentialRecord`]: a string map with fixed
//! keys. Deserialization performs structural checks only; whether the service still accepts
//! the tokens is established by verification, which must follow every restore because the
//! refresh token inside the record is single-use.

// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret, UserId},
};

/// Record key holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Record key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Record key holding the owning user's identifier.
pub const USER_ID_KEY: &str = "user_id";
/// Record key holding the access-token expiry as whole unix seconds.
///
/// Sub-second precision is dropped; credentials built by the SDK already carry none, so they
/// survive a round trip unchanged.
pub const EXPIRES_AT_KEY: &str = "expires_at";

/// Flat key-value snapshot of a credential; optional values are omitted.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialRecord(BTreeMap<String, String>);
impl CredentialRecord {
	/// Looks up a raw value.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str)
	}

	/// Inserts or replaces a raw value.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.0.insert(key.into(), value.into());
	}

	/// Borrow the underlying map, e.g. to write it into a host store.
	pub fn as_map(&self) -> &BTreeMap<String, String> {
		&self.0
	}
}
impl From<BTreeMap<String, String>> for CredentialRecord {
	fn from(map: BTreeMap<String, String>) -> Self {
		Self(map)
	}
}
impl From<CredentialRecord> for BTreeMap<String, String> {
	fn from(record: CredentialRecord) -> Self {
		record.0
	}
}
impl Debug for CredentialRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_map()
			.entries(self.0.iter().map(|(key, value)| {
				let shown = match key.as_str() {
					ACCESS_TOKEN_KEY | REFRESH_TOKEN_KEY => "<redacted>",
					_ => value.as_str(),
				};

				(key, shown)
			}))
			.finish()
	}
}

/// Converts a live credential into its persistable record.
pub fn serialize(credential: &Credential) -> CredentialRecord {
	let mut record = CredentialRecord::default();

	record.insert(ACCESS_TOKEN_KEY, credential.access_token.expose());

	if let Some(refresh) = credential.refresh_token.as_ref() {
		record.insert(REFRESH_TOKEN_KEY, refresh.expose());
	}
	if let Some(user) = credential.user_id {
		record.insert(USER_ID_KEY, user.to_string());
	}
	if let Some(expiry) = credential.expires_at {
		record.insert(EXPIRES_AT_KEY, expiry.unix_timestamp().to_string());
	}

	record
}

/// Restores a credential from a record; fails only on structural problems.
pub fn deserialize(record: &CredentialRecord) -> Result<Credential> {
	let access_token = match record.get(ACCESS_TOKEN_KEY) {
		Some(value) if !value.trim().is_empty() => TokenSecret::new(value),
		Some(_) => return Err(malformed(ACCESS_TOKEN_KEY, "value is empty")),
		None => return Err(malformed(ACCESS_TOKEN_KEY, "key is missing")),
	};
	let refresh_token = match record.get(REFRESH_TOKEN_KEY) {
		Some(value) if value.trim().is_empty() =>
			return Err(malformed(REFRESH_TOKEN_KEY, "value is empty")),
		Some(value) => Some(TokenSecret::new(value)),
		None => None,
	};
	let user_id = record
		.get(USER_ID_KEY)
		.map(|value| value.parse::<UserId>())
		.transpose()
		.map_err(|e| malformed(USER_ID_KEY, e.to_string()))?;
	let expires_at = record
		.get(EXPIRES_AT_KEY)
		.map(|value| {
			let secs = value.trim().parse::<i64>().map_err(|e| e.to_string())?;

			OffsetDateTime::from_unix_timestamp(secs).map_err(|e| e.to_string())
		})
		.transpose()
		.map_err(|reason| malformed(EXPIRES_AT_KEY, reason))?;

	Ok(Credential { access_token, refresh_token, expires_at, user_id })
}

fn malformed(key: &'static str, reason: impl Into<String>) -> Error {
	Error::MalformedCredential { key, reason: reason.into() }
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn credential() -> Credential {
		Credential::builder()
			.access_token("access-1")
			.refresh_token("refresh-1")
			.expires_at(macros::datetime!(2030-01-01 00:00 UTC))
			.user_id(UserId::new(3).expect("User fixture should be valid."))
			.build()
			.expect("Credential fixture should build.")
	}

	#[test]
	fn record_uses_fixed_keys() {
		let record = serialize(&credential());

		assert_eq!(record.get(ACCESS_TOKEN_KEY), Some("access-1"));
		assert_eq!(record.get(REFRESH_TOKEN_KEY), Some("refresh-1"));
		assert_eq!(record.get(USER_ID_KEY), Some("3"));
		assert_eq!(record.get(EXPIRES_AT_KEY), Some("1893456000"));
		assert_eq!(record.as_map().len(), 4);
	}

	#[test]
	fn optional_values_are_omitted() {
		let bare = Credential::builder().access_token("only").build().expect("Fixture should build.");
		let record = serialize(&bare);
		let json = serde_json::to_string(&record).expect("Record should serialize.");

		assert_eq!(json, r#"{"access_token":"only"}"#);

		let restored = deserialize(&record).expect("Bare record should restore.");

		assert!(restored.refresh_token.is_none());
		assert!(restored.expires_at.is_none());
	}

	#[test]
	fn restore_reproduces_every_field() {
		let restored = deserialize(&serialize(&credential())).expect("Record should restore.");

		assert_eq!(restored.access_token.expose(), "access-1");
		assert_eq!(restored.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-1"));
		assert_eq!(restored.expires_at, Some(macros::datetime!(2030-01-01 00:00 UTC)));
		assert_eq!(restored.user_id.map(UserId::get), Some(3));
	}

	#[test]
	fn clock_relative_expiries_survive_a_round_trip() {
		let live = Credential::builder()
			.access_token("access-1")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Credential fixture should build.");
		let restored = deserialize(&serialize(&live)).expect("Record should restore.");

		assert_eq!(restored.expires_at, live.expires_at);
	}

	#[test]
	fn structural_problems_name_the_key() {
		let mut record = serialize(&credential());

		record.insert(USER_ID_KEY, "three");

		assert!(matches!(
			deserialize(&record),
			Err(Error::MalformedCredential { key: USER_ID_KEY, .. })
		));

		let mut record = serialize(&credential());

		record.insert(EXPIRES_AT_KEY, "soon");

		assert!(matches!(
			deserialize(&record),
			Err(Error::MalformedCredential { key: EXPIRES_AT_KEY, .. })
		));
		assert!(matches!(
			deserialize(&CredentialRecord::default()),
			Err(Error::MalformedCredential { key: ACCESS_TOKEN_KEY, .. })
		));

		let mut record = serialize(&credential());

		record.insert(REFRESH_TOKEN_KEY, " ");

		assert!(matches!(
			deserialize(&record),
			Err(Error::MalformedCredential { key: REFRESH_TOKEN_KEY, .. })
		));
	}

	#[test]
	fn debug_output_hides_tokens() {
		let rendered = format!("{:?}", serialize(&credential()));

		assert!(!rendered.contains("access-1"));
		assert!(!rendered.contains("refresh-1"));
		assert!(rendered.contains("1893456000"));
	}
}
