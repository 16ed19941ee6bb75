//! Authorization-code flow: authorize URL, callback validation, and the code exchange.

// self
use crate::{
	_prelude::*,
	auth::{AuthState, Credential},
	config::ApiConfiguration,
	dispatch::{AuthenticationOutcome, Completion},
	error::ConfigError,
	flows::{Authenticator, observed, succeeded},
	http::ApiHttpClient,
	model::User,
	oauth::TransportErrorMapper,
	obs::FlowKind,
};

impl<C, M> Authenticator<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the authorize URL the host opens for the user.
	///
	/// Uses `redirect` or, when `None`, the configuration's default redirect. Moves the session
	/// to `AuthorizationRequested`.
	pub fn authorization_url(&self, redirect: Option<&Url>) -> Result<Url> {
		self.session().ensure_live()?;

		let redirect = match redirect {
			Some(redirect) => redirect,
			None => self.api.config.default_redirect.as_ref().ok_or(ConfigError::MissingRedirect)?,
		};
		let url = build_authorize_url(&self.api.config, redirect);

		self.session().transition(AuthState::AuthorizationRequested)?;

		Ok(url)
	}

	/// Exchanges the code carried by `callback` for a brand-new credential.
	///
	/// `callback` must share scheme, authority, and path with `base_redirect`; otherwise the
	/// call fails with [`Error::UrlMismatch`] before any request and the state is unchanged.
	pub async fn exchange_authorization_code(
		&self,
		callback: &Url,
		base_redirect: &Url,
	) -> Result<Credential> {
		observed(FlowKind::Authorization, "exchange_authorization_code", succeeded, async move {
			let credential = self.exchange(callback, base_redirect).await?;

			self.session().settle(AuthState::Authenticated);

			Ok(credential)
		})
		.await
	}

	/// Exchanges the callback's code and loads the user's profile with the new credential.
	///
	/// The code is single-use: if the profile load fails for any reason but a rejection, the
	/// new credential comes back inside [`Error::Unverified`].
	pub async fn authenticate_callback(
		&self,
		callback: &Url,
		base_redirect: &Url,
	) -> Result<User<C, M>> {
		observed(FlowKind::Authorization, "authenticate_callback", succeeded, async move {
			let credential = self.exchange(callback, base_redirect).await?;

			match self.load_user(credential, true).await {
				Ok(user) => {
					self.session().settle(AuthState::Authenticated);

					Ok(user)
				},
				Err(e) => {
					self.session().settle(failure_state(&e));

					Err(e)
				},
			}
		})
		.await
	}

	/// Callback form of [`Self::authenticate_callback`].
	///
	/// The request is registered before this returns; spawn the future to run it.
	pub fn authenticate_callback_with(
		&self,
		callback: Url,
		base_redirect: Url,
		target: Arc<dyn Completion<AuthenticationOutcome<C, M>>>,
	) -> impl Future<Output = ()> + Send + '_ {
		let pending = self.api.dispatcher.register(FlowKind::Authorization, target);

		async move {
			let result = self.authenticate_callback(&callback, &base_redirect).await;

			pending.dispatch(result.into());
		}
	}

	/// Validates the callback and runs the token exchange, leaving the session in
	/// `TokenExchangePending` on success.
	async fn exchange(&self, callback: &Url, base_redirect: &Url) -> Result<Credential> {
		let session = self.session();

		session.ensure_live()?;

		if !redirect_matches(callback, base_redirect) {
			return Err(Error::UrlMismatch {
				expected: base_redirect.to_string(),
				actual: callback.to_string(),
			});
		}

		let code = match callback_code(callback) {
			Ok(code) => code,
			Err(e) => {
				session.settle(AuthState::Unauthenticated);

				return Err(e);
			},
		};

		session.transition(AuthState::CodeReceived)?;
		session.transition(AuthState::TokenExchangePending)?;

		let result = match self.api.token_facade() {
			Ok(facade) => facade.exchange_code(&code, base_redirect).await,
			Err(e) => Err(e),
		};

		if let Err(e) = &result {
			session.settle(failure_state(e));
		}

		result
	}
}

/// Rejections revoke the session; any other failure sends it back to the start.
fn failure_state(error: &Error) -> AuthState {
	if error.is_authentication_failure() { AuthState::Revoked } else { AuthState::Unauthenticated }
}

fn build_authorize_url(config: &ApiConfiguration, redirect: &Url) -> Url {
	let mut url = config.authorization_endpoint.clone();

	url.query_pairs_mut()
		.append_pair("response_type", "code")
		.append_pair("client_id", &config.client_id)
		.append_pair("redirect_uri", redirect.as_str());

	url
}

/// Scheme, authority, and path must agree; the query is ignored.
pub(crate) fn redirect_matches(callback: &Url, base: &Url) -> bool {
	callback.scheme() == base.scheme()
		&& callback.authority() == base.authority()
		&& callback.path() == base.path()
}

/// Extracts the authorization code, or the provider's denial.
pub(crate) fn callback_code(callback: &Url) -> Result<String> {
	let mut code = None;
	let mut denial = None;

	for (key, value) in callback.query_pairs() {
		match key.as_ref() {
			"code" if !value.is_empty() => code = Some(value.into_owned()),
			"error" => denial = Some(value.into_owned()),
			_ => {},
		}
	}

	if let Some(reason) = denial {
		return Err(Error::AuthorizationDenied { reason });
	}

	code.ok_or_else(|| Error::AuthorizationDenied {
		reason: "callback carries no authorization code".into(),
	})
}
