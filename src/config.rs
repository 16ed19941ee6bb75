//! Service configuration passed explicitly to every entry point.
//!
//! [`ApiConfiguration`] describes where the reading service lives (API base, authorize and
//! token endpoints) and which client the application authenticates as. Values are validated
//! by [`ApiConfigurationBuilder`]; presets cover the production and staging hosts.

/// Builder API for assembling configurations.
pub mod builder;

pub use builder::*;

// self
use crate::_prelude::*;

const PRODUCTION_HOST: &str = "https://readmill.com";
const PRODUCTION_API: &str = "https://api.readmill.com/v2/";
const STAGING_HOST: &str = "https://stage-readmill.com";
const STAGING_API: &str = "https://api.stage-readmill.com/v2/";

/// Immutable service configuration consumed by flows.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfiguration {
	/// Base URL every resource path is joined onto; always ends with `/`.
	pub api_base: Url,
	/// Provider authorize endpoint users are sent to.
	pub authorization_endpoint: Url,
	/// Token endpoint used for code exchanges and credential rotation.
	pub token_endpoint: Url,
	/// OAuth client identifier of the host application.
	pub client_id: String,
	/// Optional client secret sent in the token request body.
	pub client_secret: Option<String>,
	/// Redirect used when the caller does not supply one.
	pub default_redirect: Option<Url>,
}
impl ApiConfiguration {
	/// Creates a new builder for the provided client identifier.
	pub fn builder(client_id: impl Into<String>) -> ApiConfigurationBuilder {
		ApiConfigurationBuilder::new(client_id)
	}

	/// Production service preset.
	pub fn production(
		client_id: impl Into<String>,
	) -> Result<ApiConfigurationBuilder, ConfigurationError> {
		Self::preset(client_id, PRODUCTION_HOST, PRODUCTION_API)
	}

	/// Staging service preset.
	pub fn staging(
		client_id: impl Into<String>,
	) -> Result<ApiConfigurationBuilder, ConfigurationError> {
		Self::preset(client_id, STAGING_HOST, STAGING_API)
	}

	/// Resolves a resource path (no leading slash) against [`Self::api_base`].
	pub fn endpoint(&self, path: &str) -> Result<Url> {
		self.api_base
			.join(path)
			.map_err(|source| crate::error::ConfigError::InvalidEndpoint { source }.into())
	}

	fn preset(
		client_id: impl Into<String>,
		host: &str,
		api: &str,
	) -> Result<ApiConfigurationBuilder, ConfigurationError> {
		let parse = |raw: &str| {
			Url::parse(raw).map_err(|_| ConfigurationError::InvalidUrl { url: raw.into() })
		};
		let host = parse(host)?;
		let join = |path: &str| {
			host.join(path).map_err(|_| ConfigurationError::InvalidUrl { url: path.into() })
		};

		Ok(Self::builder(client_id)
			.api_base(parse(api)?)
			.authorization_endpoint(join("/oauth/authorize")?)
			.token_endpoint(join("/oauth/token")?))
	}
}
impl Debug for ApiConfiguration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiConfiguration")
			.field("api_base", &self.api_base.as_str())
			.field("authorization_endpoint", &self.authorization_endpoint.as_str())
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("default_redirect", &self.default_redirect.as_ref().map(Url::as_str))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn presets_point_at_oauth_paths() {
		let config = ApiConfiguration::production("client")
			.expect("Production preset URLs should parse.")
			.build()
			.expect("Production preset should validate.");

		assert_eq!(config.authorization_endpoint.as_str(), "https://readmill.com/oauth/authorize");
		assert_eq!(config.token_endpoint.as_str(), "https://readmill.com/oauth/token");
		assert_eq!(
			config.endpoint("me").expect("Profile path should resolve.").as_str(),
			"https://api.readmill.com/v2/me"
		);
	}

	#[test]
	fn debug_output_hides_the_client_secret() {
		let config = ApiConfiguration::staging("client")
			.expect("Staging preset URLs should parse.")
			.client_secret("hunter2")
			.build()
			.expect("Staging preset should validate.");
		let rendered = format!("{config:?}");

		assert!(!rendered.contains("hunter2"));
		assert!(rendered.contains("client_secret_set: true"));
	}
}
