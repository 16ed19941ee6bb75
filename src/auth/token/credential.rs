//! Move-only credential model, lifecycle helpers, and builder.
//!
//! A [`Credential`] is not `Clone`. Verification takes it by value and hands the rotated pair
//! back inside the resulting user; only one live copy of a token pair exists at a time.

// self
use crate::{
	_prelude::*,
	auth::{UserId, token::secret::TokenSecret},
};

/// Lifecycle status of a credential at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
	/// Access token is within its lifetime (or the service did not report an expiry).
	Active,
	/// Access token exceeded its expiry instant; only the refresh token is still useful.
	Expired,
}

/// Errors produced by [`CredentialBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CredentialBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when the access token is blank.
	#[error("Access token cannot be blank.")]
	BlankAccessToken,
}

/// Token pair issued by the service plus the user it belongs to.
///
/// Persist it through [`store::serialize`](crate::store::serialize).
pub struct Credential {
	/// Bearer token sent with every API call.
	pub access_token: TokenSecret,
	/// Refresh token used to rotate the pair during verification.
	pub refresh_token: Option<TokenSecret>,
	/// Access-token expiry, when the service reported one.
	///
	/// Kept at whole-second precision, matching what a persisted record can hold.
	pub expires_at: Option<OffsetDateTime>,
	/// Owning user; unknown until the profile has been loaded once.
	pub user_id: Option<UserId>,
}
impl Credential {
	/// Returns a builder for constructing credentials.
	pub fn builder() -> CredentialBuilder {
		CredentialBuilder::default()
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> CredentialStatus {
		match self.expires_at {
			Some(expiry) if instant >= expiry => CredentialStatus::Expired,
			_ => CredentialStatus::Active,
		}
	}

	/// Returns `true` if the access token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), CredentialStatus::Expired)
	}

	/// Returns `true` if the access token is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Replaces the token pair with a freshly issued one.
	///
	/// When the service does not return a new refresh token the current one stays in place;
	/// the owning user carries over.
	pub(crate) fn rotate(&mut self, issued: Credential) {
		self.access_token = issued.access_token;
		self.expires_at = issued.expires_at;

		if let Some(refresh) = issued.refresh_token {
			self.refresh_token = Some(refresh);
		}
		if let Some(user) = issued.user_id {
			self.user_id = Some(user);
		}
	}

	pub(crate) fn bind_user(&mut self, user_id: UserId) {
		self.user_id = Some(user_id);
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.field("user_id", &self.user_id)
			.finish()
	}
}

/// Builder for [`Credential`].
#[derive(Debug, Default)]
pub struct CredentialBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	user_id: Option<UserId>,
}
impl CredentialBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the issued-at instant used with [`Self::expires_in`].
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry measured from the issued instant (defaults to now).
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Sets the owning user.
	pub fn user_id(mut self, user_id: UserId) -> Self {
		self.user_id = Some(user_id);

		self
	}

	/// Consumes the builder and produces a [`Credential`].
	pub fn build(self) -> Result<Credential, CredentialBuilderError> {
		let access_token = self.access_token.ok_or(CredentialBuilderError::MissingAccessToken)?;

		if access_token.is_blank() {
			return Err(CredentialBuilderError::BlankAccessToken);
		}

		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => Some(instant),
			(None, Some(delta)) =>
				Some(self.issued_at.unwrap_or_else(OffsetDateTime::now_utc) + delta),
			(None, None) => None,
		}
		.map(whole_seconds);

		Ok(Credential {
			access_token,
			refresh_token: self.refresh_token.filter(|secret| !secret.is_blank()),
			expires_at,
			user_id: self.user_id,
		})
	}
}

/// Drops the sub-second part of `instant`.
pub(crate) fn whole_seconds(instant: OffsetDateTime) -> OffsetDateTime {
	instant - Duration::nanoseconds(i64::from(instant.nanosecond()))
}
