//! SDK-level error types shared across flows, the transport, and the credential store.

// self
use crate::{
	_prelude::*,
	auth::{AuthState, Credential},
	http::ApiEndpoint,
};

/// SDK-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical SDK error exposed by public APIs.
///
/// A lookup that matches nothing is not an error; it is reported as
/// [`Resolution::NotFound`](crate::flows::Resolution::NotFound).
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Network or protocol failure passed through from the transport.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Callback URL does not share scheme, authority, and path with the registered redirect.
	#[error("Callback URL `{actual}` does not match the redirect URL `{expected}`.")]
	UrlMismatch {
		/// Redirect URL the authorization request was started with.
		expected: String,
		/// Callback URL handed to the SDK.
		actual: String,
	},
	/// Caller-supplied search or creation criteria are insufficient.
	#[error("Invalid request: {reason}.")]
	Validation {
		/// Human-readable explanation of the missing criteria.
		reason: String,
	},
	/// Service rejected the credential during the exchange or verification.
	#[error("Authentication failed: {reason}.")]
	AuthenticationFailed {
		/// Service- or SDK-supplied reason string.
		reason: String,
	},
	/// Provider redirected back with an `error` parameter or without a code.
	#[error("Authorization was denied: {reason}.")]
	AuthorizationDenied {
		/// Value of the callback's `error` parameter, or a description of the missing code.
		reason: String,
	},
	/// Persisted credential record failed structural validation.
	#[error("Persisted credential is malformed at `{key}`: {reason}.")]
	MalformedCredential {
		/// Record key that failed validation.
		key: &'static str,
		/// Description of the structural problem.
		reason: String,
	},
	/// The service issued a new credential but loading the profile with it failed.
	///
	/// Whatever produced the credential (a code or a refresh token) is already spent. Persist
	/// [`Error::issued_credential`] and verify it again once the service is reachable.
	#[error("A credential was issued but the profile could not be loaded with it.")]
	Unverified {
		/// Credential issued before the failure.
		credential: Box<Credential>,
		/// Failure raised while loading the profile.
		#[source]
		source: Box<Error>,
	},
	/// Session was revoked; call `reset` and start a new authorization.
	#[error("Session has been revoked.")]
	SessionRevoked,
	/// Requested state change is not part of the authentication lifecycle.
	#[error("Session cannot move from {from} to {to}.")]
	InvalidTransition {
		/// Current state.
		from: AuthState,
		/// Rejected target state.
		to: AuthState,
	},
}
impl Error {
	/// Builds a [`Error::Validation`] from any displayable reason.
	pub fn validation(reason: impl Into<String>) -> Self {
		Self::Validation { reason: reason.into() }
	}

	/// Returns `true` when the service rejected the credential.
	pub fn is_authentication_failure(&self) -> bool {
		matches!(self, Self::AuthenticationFailed { .. })
	}

	/// Credential the service issued before this failure, if any.
	pub fn issued_credential(&self) -> Option<&Credential> {
		match self {
			Self::Unverified { credential, .. } => Some(&**credential),
			_ => None,
		}
	}

	/// Takes the credential the service issued before this failure, if any.
	pub fn into_issued_credential(self) -> Option<Credential> {
		match self {
			Self::Unverified { credential, .. } => Some(*credential),
			_ => None,
		}
	}

	pub(crate) fn unverified(credential: Credential, source: Error) -> Self {
		Self::Unverified { credential: Box::new(credential), source: Box::new(source) }
	}
}

/// Configuration and request-construction failures raised by the SDK.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Configured endpoint cannot be used by the OAuth client.
	#[error("Configuration contains an invalid URL.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Neither the caller nor the configuration supplied a redirect URL.
	#[error("No redirect URL was supplied and the configuration has no default.")]
	MissingRedirect,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures, passed through to callers without retries.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the service.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the service.")]
	Io(#[from] std::io::Error),
	/// Service answered with a non-success status.
	#[error("The {endpoint} endpoint returned HTTP {status}: {message}.")]
	Status {
		/// Endpoint that produced the response.
		endpoint: ApiEndpoint,
		/// HTTP status code.
		status: u16,
		/// Service- or SDK-supplied message summarizing the failure.
		message: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Service answered with a body that could not be decoded.
	#[error("The {endpoint} endpoint returned malformed JSON.")]
	Decode {
		/// Endpoint that produced the response.
		endpoint: ApiEndpoint,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// HTTP client failed in a way the mapper could not classify.
	#[error("Unexpected transport failure while calling the {endpoint} endpoint: {message}.")]
	Unexpected {
		/// Endpoint being called.
		endpoint: ApiEndpoint,
		/// Client-supplied description.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// HTTP status attached to the failure, when one was observed.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Status { status, .. } => Some(*status),
			_ => None,
		}
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn transport_errors_keep_their_source() {
		let io = std::io::Error::other("socket closed");
		let err: Error = TransportError::from(io).into();

		assert!(matches!(err, Error::Transport(TransportError::Io(_))));

		let source = StdError::source(&err).expect("Transparent errors should expose a source.");

		assert_eq!(source.to_string(), "socket closed");
	}

	#[test]
	fn status_errors_render_endpoint_and_code() {
		let err = TransportError::Status {
			endpoint: ApiEndpoint::Books,
			status: 503,
			message: "maintenance".into(),
			retry_after: None,
		};

		assert_eq!(err.status(), Some(503));
		assert_eq!(err.to_string(), "The books endpoint returned HTTP 503: maintenance.");
	}

	#[test]
	fn authentication_failures_are_detectable() {
		let err = Error::AuthenticationFailed { reason: "token revoked".into() };

		assert!(err.is_authentication_failure());
		assert!(!Error::validation("missing title").is_authentication_failure());
	}

	#[test]
	fn unverified_errors_hand_back_the_issued_credential() {
		let credential = Credential::builder()
			.access_token("issued")
			.refresh_token("issued-refresh")
			.build()
			.expect("Credential fixture should build.");
		let cause = TransportError::Status {
			endpoint: ApiEndpoint::Profile,
			status: 503,
			message: "maintenance".into(),
			retry_after: None,
		};
		let err = Error::unverified(credential, cause.into());

		assert!(!err.is_authentication_failure());
		assert_eq!(
			StdError::source(&err).map(ToString::to_string).as_deref(),
			Some("The profile endpoint returned HTTP 503: maintenance.")
		);
		assert!(err.issued_credential().is_some());
		assert_eq!(
			err.into_issued_credential().map(|credential| credential.access_token.expose().to_owned()),
			Some("issued".to_owned())
		);
		assert!(Error::SessionRevoked.into_issued_credential().is_none());
	}
}
