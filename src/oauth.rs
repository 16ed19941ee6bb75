//! OAuth token endpoint facade and transport error mapping.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::Credential,
	config::ApiConfiguration,
	error::{ConfigError, TransportError},
	http::{ApiEndpoint, ApiHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// OAuth `error` codes that mean the service refused the grant or the client.
const REJECTION_CODES: [&str; 4] =
	["invalid_grant", "invalid_client", "unauthorized_client", "access_denied"];

/// Maps HTTP transport failures into SDK [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into an SDK error.
	fn map_transport_error(
		&self,
		endpoint: ApiEndpoint,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: ApiEndpoint,
		_metadata: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) if inner.is_builder() => ConfigError::from(*inner).into(),
			HttpClientError::Reqwest(inner) => TransportError::from(*inner).into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => TransportError::Unexpected { endpoint, message }.into(),
			_ => TransportError::Unexpected { endpoint, message: "unclassified client error".into() }
				.into(),
		}
	}
}

/// Token endpoint client built from an [`ApiConfiguration`].
pub(crate) struct BasicFacade<'a, C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	http_client: &'a C,
	error_mapper: &'a M,
}
impl<'a, C, M> BasicFacade<'a, C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_config(
		config: &ApiConfiguration,
		http_client: &'a C,
		error_mapper: &'a M,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(config.authorization_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let token_url = TokenUrl::new(config.token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let mut oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);

		if let Some(secret) = config.client_secret.as_ref() {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.clone()));
		}

		Ok(Self { oauth_client, http_client, error_mapper })
	}

	/// `grant_type=authorization_code`; the redirect must equal the one used to authorize.
	pub(crate) async fn exchange_code(&self, code: &str, redirect_uri: &Url) -> Result<Credential> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_redirect_uri(Cow::Owned(redirect_url))
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(meta.take(), err, self.error_mapper))?;

		credential_from_response(&response)
	}

	/// `grant_type=refresh_token`; the service may rotate the refresh token.
	pub(crate) async fn refresh(&self, refresh_token: &str) -> Result<Credential> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token.to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&refresh_secret)
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(meta.take(), err, self.error_mapper))?;

		credential_from_response(&response)
	}
}

fn credential_from_response(response: &BasicTokenResponse) -> Result<Credential> {
	let mut builder = Credential::builder()
		.access_token(response.access_token().secret().to_owned())
		.issued_at(OffsetDateTime::now_utc());

	if let Some(expires_in) = response.expires_in() {
		let secs =
			i64::try_from(expires_in.as_secs()).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

		builder = builder.expires_in(Duration::seconds(secs));
	}
	if let Some(refresh) = response.refresh_token() {
		builder = builder.refresh_token(refresh.secret().to_owned());
	}

	builder.build().map_err(|err| Error::AuthenticationFailed {
		reason: format!("token endpoint issued an unusable credential: {err}"),
	})
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response, meta_ref),
		RequestTokenError::Request(error) =>
			mapper.map_transport_error(ApiEndpoint::Token, meta_ref, error),
		RequestTokenError::Parse(source, _body) if meta_status(meta_ref) == Some(401) =>
			Error::AuthenticationFailed { reason: format!("token endpoint returned 401: {source}") },
		RequestTokenError::Parse(source, _body) =>
			TransportError::Decode { endpoint: ApiEndpoint::Token, source }.into(),
		RequestTokenError::Other(message) => match meta_status(meta_ref) {
			Some(401) => Error::AuthenticationFailed { reason: message },
			Some(status) => TransportError::Status {
				endpoint: ApiEndpoint::Token,
				status,
				message,
				retry_after: meta_retry_after(meta_ref),
			}
			.into(),
			None => TransportError::Unexpected { endpoint: ApiEndpoint::Token, message }.into(),
		},
	}
}

fn map_server_response_error(
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let code = response.error().as_ref().to_owned();
	let message = match response.error_description() {
		Some(description) => format!("{code}: {description}"),
		None => code.clone(),
	};
	let status = meta_status(meta);

	if status == Some(401) || REJECTION_CODES.iter().any(|known| code.eq_ignore_ascii_case(known))
	{
		return Error::AuthenticationFailed { reason: message };
	}

	TransportError::Status {
		endpoint: ApiEndpoint::Token,
		status: status.unwrap_or(400),
		message,
		retry_after: meta_retry_after(meta),
	}
	.into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::{StandardErrorResponse, basic::BasicErrorResponseType};
	// self
	use super::*;

	fn server_error(code: BasicErrorResponseType) -> BasicErrorResponse {
		StandardErrorResponse::new(code, Some("nope".into()), None)
	}

	#[test]
	fn rejected_grants_become_authentication_failures() {
		let err = map_server_response_error(
			server_error(BasicErrorResponseType::InvalidGrant),
			Some(&ResponseMetadata { status: Some(400), retry_after: None }),
		);

		assert!(matches!(err, Error::AuthenticationFailed { ref reason } if reason == "invalid_grant: nope"));
	}

	#[test]
	fn other_server_errors_pass_through_as_status() {
		let err = map_server_response_error(
			server_error(BasicErrorResponseType::Extension("temporarily_unavailable".into())),
			Some(&ResponseMetadata { status: Some(503), retry_after: Some(Duration::seconds(5)) }),
		);

		assert!(matches!(
			err,
			Error::Transport(TransportError::Status {
				endpoint: ApiEndpoint::Token,
				status: 503,
				retry_after: Some(_),
				..
			})
		));
	}

	#[test]
	fn unauthorized_status_wins_over_unknown_codes() {
		let err = map_server_response_error(
			server_error(BasicErrorResponseType::Extension("token_expired".into())),
			Some(&ResponseMetadata { status: Some(401), retry_after: None }),
		);

		assert!(err.is_authentication_failure());
	}
}
