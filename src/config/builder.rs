// self
use crate::{_prelude::*, config::ApiConfiguration};

/// Errors raised while constructing or validating configurations.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ConfigurationError {
	/// API base URL is mandatory.
	#[error("Missing API base URL.")]
	MissingApiBase,
	/// Authorize endpoint is mandatory.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is mandatory.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Client identifier cannot be blank.
	#[error("Client identifier cannot be empty.")]
	EmptyClientId,
	/// A preset or caller-supplied URL failed to parse.
	#[error("URL cannot be parsed: {url}.")]
	InvalidUrl {
		/// Raw URL text.
		url: String,
	},
	/// The API base must be usable as a join base.
	#[error("The API base cannot be used as a base URL: {url}.")]
	CannotBeABase {
		/// Offending URL.
		url: String,
	},
	/// Endpoints must use HTTPS unless insecure endpoints were explicitly allowed.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Builder for [`ApiConfiguration`] values.
#[derive(Debug)]
pub struct ApiConfigurationBuilder {
	/// OAuth client identifier.
	pub client_id: String,
	/// Optional client secret.
	pub client_secret: Option<String>,
	/// API base URL.
	pub api_base: Option<Url>,
	/// Authorize endpoint.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint.
	pub token_endpoint: Option<Url>,
	/// Default redirect URL.
	pub default_redirect: Option<Url>,
	/// Permits plain `http` endpoints (local servers, tests).
	pub allow_insecure: bool,
}
impl ApiConfigurationBuilder {
	/// Creates a new builder seeded with the provided client identifier.
	pub fn new(client_id: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: None,
			api_base: None,
			authorization_endpoint: None,
			token_endpoint: None,
			default_redirect: None,
			allow_insecure: false,
		}
	}

	/// Sets the API base URL. A missing trailing slash is added so relative joins keep the
	/// last path segment.
	pub fn api_base(mut self, mut url: Url) -> Self {
		if !url.path().ends_with('/') {
			let path = format!("{}/", url.path());

			url.set_path(&path);
		}

		self.api_base = Some(url);

		self
	}

	/// Sets the authorize endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the client secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Sets the redirect used when callers omit one.
	pub fn default_redirect(mut self, url: Url) -> Self {
		self.default_redirect = Some(url);

		self
	}

	/// Allows `http` endpoints.
	pub fn allow_insecure(mut self, allow: bool) -> Self {
		self.allow_insecure = allow;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ApiConfiguration, ConfigurationError> {
		let api_base = self.api_base.ok_or(ConfigurationError::MissingApiBase)?;
		let authorization_endpoint =
			self.authorization_endpoint.ok_or(ConfigurationError::MissingAuthorizationEndpoint)?;
		let token_endpoint = self.token_endpoint.ok_or(ConfigurationError::MissingTokenEndpoint)?;

		if self.client_id.trim().is_empty() {
			return Err(ConfigurationError::EmptyClientId);
		}
		if api_base.cannot_be_a_base() {
			return Err(ConfigurationError::CannotBeABase { url: api_base.to_string() });
		}
		if !self.allow_insecure {
			validate_endpoint("api", &api_base)?;
			validate_endpoint("authorization", &authorization_endpoint)?;
			validate_endpoint("token", &token_endpoint)?;
		}

		Ok(ApiConfiguration {
			api_base,
			authorization_endpoint,
			token_endpoint,
			client_id: self.client_id,
			client_secret: self.client_secret,
			default_redirect: self.default_redirect,
		})
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigurationError> {
	if url.scheme() != "https" {
		Err(ConfigurationError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}
