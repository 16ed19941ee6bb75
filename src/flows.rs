//! High-level flows: the authentication lifecycle and resource resolution.
//!
//! [`Authenticator`] drives the authorization-code exchange and credential verification and
//! hands out [`User`] values. Resource resolution (books, readings, highlights) is exposed as
//! methods on [`User`], built on the generic find-or-create protocol in [`resolve`].
//!
//! Every flow has an `async` form returning `Result` and a callback form (`*_with`) that
//! registers a [`PendingRequest`](crate::dispatch::PendingRequest) immediately and returns a
//! `Send` future for the host to spawn.

pub mod authorization;
pub mod book;
pub mod highlight;
pub mod reading;
pub mod resolve;
pub mod verification;

pub use authorization::*;
pub use book::*;
pub use resolve::*;
pub use verification::*;

// self
use crate::{
	_prelude::*,
	api::Api,
	auth::{AuthState, Credential, Session},
	config::ApiConfiguration,
	http::ApiHttpClient,
	model::{User, UserProfile},
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Authenticator specialized for the crate's default reqwest transport stack.
pub type ReqwestAuthenticator = Authenticator<ReqwestHttpClient, ReqwestTransportErrorMapper>;
#[cfg(feature = "reqwest")]
/// User bound to the crate's default reqwest transport stack.
pub type ReqwestUser = User<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Drives one authentication session against the service.
///
/// Clones share the [`Session`] and the [`Api`] handle.
pub struct Authenticator<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Shared service handle; every [`User`] produced here keeps a reference to it.
	pub api: Arc<Api<C, M>>,
	session: Session,
}
impl<C, M> Authenticator<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an authenticator that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: ApiConfiguration,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self::from_api(Arc::new(Api::with_http_client(config, http_client, mapper)))
	}

	/// Starts a fresh session on an existing service handle.
	pub fn from_api(api: Arc<Api<C, M>>) -> Self {
		Self { api, session: Session::default() }
	}

	/// Session driven by this authenticator.
	pub fn session(&self) -> &Session {
		&self.session
	}

	/// Current lifecycle state.
	pub fn state(&self) -> AuthState {
		self.session.state()
	}

	/// Returns the session to `Unauthenticated`; required after a revocation.
	pub fn reset(&self) {
		self.session.reset();
	}

	/// Loads the profile with `credential` and binds the resulting user to this session.
	///
	/// When `issued` is set the grant behind `credential` is already spent, so failures other
	/// than a rejection hand it back inside [`Error::Unverified`].
	async fn load_user(&self, mut credential: Credential, issued: bool) -> Result<User<C, M>> {
		match load_profile(&self.api, &mut credential).await {
			Ok(profile) =>
				Ok(User::new(self.api.clone(), self.session.clone(), profile, credential)),
			Err(e) if issued && !e.is_authentication_failure() =>
				Err(Error::unverified(credential, e)),
			Err(e) => Err(e),
		}
	}
}
#[cfg(feature = "reqwest")]
impl Authenticator<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an authenticator backed by a fresh reqwest transport.
	pub fn new(config: ApiConfiguration) -> Self {
		Self::from_api(Arc::new(Api::new(config)))
	}
}
impl<C, M> Clone for Authenticator<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self { api: self.api.clone(), session: self.session.clone() }
	}
}
impl<C, M> Debug for Authenticator<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Authenticator")
			.field("api", &self.api)
			.field("state", &self.session.state())
			.finish()
	}
}

/// `GET /me` with `credential`, folding in any pair the service rotated alongside the profile.
pub(crate) async fn load_profile<C, M>(
	api: &Api<C, M>,
	credential: &mut Credential,
) -> Result<UserProfile>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let response = api.fetch_profile(&credential.access_token).await?;

	Ok(response.rotate_into(credential))
}

/// Wraps a flow in its span and records attempt and terminal outcome metrics.
pub(crate) async fn observed<T, Fut, F>(
	kind: FlowKind,
	stage: &'static str,
	classify: F,
	flow: Fut,
) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
	F: FnOnce(&T) -> FlowOutcome,
{
	let span = FlowSpan::new(kind, stage);

	obs::record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(flow).await;

	match &result {
		Ok(value) => obs::record_flow_outcome(kind, classify(value)),
		Err(_) => obs::record_flow_outcome(kind, FlowOutcome::Failure),
	}

	result
}

pub(crate) fn succeeded<T>(_: &T) -> FlowOutcome {
	FlowOutcome::Success
}
