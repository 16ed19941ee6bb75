//! Credential verification: rotate the token pair, then prove it against `GET /me`.
//!
//! A restored credential is one-time-use. Verification spends its refresh token and hands back
//! a [`User`] carrying the rotated pair; persist that pair before anything else, because the
//! record it came from will never verify again. If the profile load fails after the rotation,
//! the rotated pair comes back inside [`Error::Unverified`] instead.

// self
use crate::{
	_prelude::*,
	api::Api,
	auth::{AuthState, Credential},
	config::ApiConfiguration,
	dispatch::{AuthenticationOutcome, Completion},
	flows::{Authenticator, load_profile, observed, succeeded},
	http::ApiHttpClient,
	model::User,
	oauth::TransportErrorMapper,
	obs::FlowKind,
	store::{self, CredentialRecord},
};

impl<C, M> Authenticator<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Rotates `credential` when it carries a refresh token, then loads the profile with it.
	///
	/// Rejections fail with [`Error::AuthenticationFailed`] and revoke the session; transport
	/// failures leave the session state unchanged. A failure after a successful rotation is
	/// wrapped in [`Error::Unverified`], which carries the rotated pair to persist and retry.
	pub async fn verify_credential(&self, credential: Credential) -> Result<User<C, M>> {
		observed(FlowKind::Verification, "verify_credential", succeeded, async move {
			let session = self.session();

			session.ensure_live()?;

			let from = session.state();

			if !from.can_transition_to(AuthState::Authenticated) {
				return Err(Error::InvalidTransition { from, to: AuthState::Authenticated });
			}

			let mut credential = credential;
			let result = match rotate(&self.api, &mut credential).await {
				Ok(rotated) => self.load_user(credential, rotated).await,
				Err(e) => Err(e),
			};

			match result {
				Ok(user) => {
					session.settle(AuthState::Authenticated);

					Ok(user)
				},
				Err(e) => {
					if e.is_authentication_failure() {
						session.settle(AuthState::Revoked);
					}

					Err(e)
				},
			}
		})
		.await
	}

	/// Restores a persisted credential and verifies it immediately.
	pub async fn authenticate_from_persisted_credential(
		&self,
		record: &CredentialRecord,
	) -> Result<User<C, M>> {
		let credential = store::deserialize(record)?;

		self.verify_credential(credential).await
	}

	/// Callback form of [`Self::verify_credential`].
	pub fn verify_credential_with(
		&self,
		credential: Credential,
		target: Arc<dyn Completion<AuthenticationOutcome<C, M>>>,
	) -> impl Future<Output = ()> + Send + '_ {
		let pending = self.api.dispatcher.register(FlowKind::Verification, target);

		async move {
			let result = self.verify_credential(credential).await;

			pending.dispatch(result.into());
		}
	}

	/// Callback form of [`Self::authenticate_from_persisted_credential`].
	pub fn authenticate_from_persisted_credential_with(
		&self,
		record: CredentialRecord,
		target: Arc<dyn Completion<AuthenticationOutcome<C, M>>>,
	) -> impl Future<Output = ()> + Send + '_ {
		let pending = self.api.dispatcher.register(FlowKind::Verification, target);

		async move {
			let result = self.authenticate_from_persisted_credential(&record).await;

			pending.dispatch(result.into());
		}
	}
}

/// Restores and verifies a persisted credential in a fresh session.
pub async fn authenticate_with_record<C, M>(
	config: ApiConfiguration,
	http_client: Arc<C>,
	mapper: Arc<M>,
	record: &CredentialRecord,
) -> Result<User<C, M>>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	Authenticator::with_http_client(config, http_client, mapper)
		.authenticate_from_persisted_credential(record)
		.await
}

impl<C, M> User<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Re-verifies the live credential in place, rotating it and refreshing the profile.
	///
	/// A rotated pair is kept even when the profile request fails afterwards; persist
	/// [`Self::credential_record`] whenever this returns, successful or not.
	pub async fn verify(&mut self) -> Result<()> {
		observed(FlowKind::Verification, "verify_user", succeeded, async move {
			self.session.ensure_live()?;

			let api = self.api.clone();
			let result = match rotate(&api, self.credential_mut()).await {
				Ok(_) => load_profile(&api, self.credential_mut()).await,
				Err(e) => Err(e),
			};

			match result {
				Ok(profile) => {
					self.update_from_record(profile);
					self.session.settle(AuthState::Authenticated);

					Ok(())
				},
				Err(e) => {
					if e.is_authentication_failure() {
						self.session.settle(AuthState::Revoked);
					}

					Err(e)
				},
			}
		})
		.await
	}
}

/// Spends the refresh token, if any; `Ok(true)` once the pair has rotated.
async fn rotate<C, M>(api: &Api<C, M>, credential: &mut Credential) -> Result<bool>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let Some(refresh) = credential.refresh_token.as_ref() else {
		return Ok(false);
	};
	let issued = api.token_facade()?.refresh(refresh.expose()).await?;

	credential.rotate(issued);

	Ok(true)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, error::TransportError};

	#[tokio::test]
	async fn verification_rotates_the_pair_and_binds_the_user() {
		let (authenticator, service) = fake_authenticator();
		let credential = service.seed_credential();
		let old_access = credential.access_token.expose().to_owned();
		let user = authenticator.verify_credential(credential).await.expect("Seeded pair verifies.");

		assert_eq!(authenticator.state(), AuthState::Authenticated);
		assert_ne!(user.credential().access_token.expose(), old_access);
		assert_eq!(user.credential().user_id.map(|id| id.get()), Some(FAKE_USER_ID));
		assert_eq!(user.profile().username, "paul");
		assert_eq!(service.requests(), 2);
	}

	#[tokio::test]
	async fn a_restored_record_verifies_only_once() {
		let (authenticator, service) = fake_authenticator();
		let record = store::serialize(&service.seed_credential());
		let user = authenticator
			.authenticate_from_persisted_credential(&record)
			.await
			.expect("First restore verifies.");
		let rotated_record = user.credential_record();

		assert_ne!(rotated_record, record);

		// The host never persisted `rotated_record`; the old record is now spent.
		drop(user);

		let err = authenticator
			.authenticate_from_persisted_credential(&record)
			.await
			.expect_err("A spent refresh token must be rejected.");

		assert!(err.is_authentication_failure());
		assert_eq!(authenticator.state(), AuthState::Revoked);
	}

	#[tokio::test]
	async fn persisting_the_rotated_record_keeps_the_session_alive() {
		let (authenticator, service) = fake_authenticator();
		let mut record = store::serialize(&service.seed_credential());

		for _ in 0..3 {
			let user = authenticator
				.authenticate_from_persisted_credential(&record)
				.await
				.expect("Each freshly persisted record verifies.");

			record = user.credential_record();
		}

		assert_eq!(authenticator.state(), AuthState::Authenticated);
	}

	#[tokio::test]
	async fn missing_refresh_token_in_the_response_keeps_the_previous_one() {
		let (authenticator, service) = fake_authenticator();
		let credential = service.seed_credential();
		let previous = credential.refresh_token.as_ref().map(|token| token.expose().to_owned());

		service.withhold_refresh_tokens();

		let user = authenticator.verify_credential(credential).await.expect("Rotation succeeds.");

		assert_eq!(
			user.credential().refresh_token.as_ref().map(|token| token.expose().to_owned()),
			previous
		);
	}

	#[tokio::test]
	async fn access_only_credentials_skip_rotation() {
		let (authenticator, service) = fake_authenticator();
		let seeded = service.seed_credential();
		let access_only = Credential::builder()
			.access_token(seeded.access_token.expose())
			.build()
			.expect("Access-only credential builds.");
		let user = authenticator.verify_credential(access_only).await.expect("Access token is live.");

		assert_eq!(user.credential().access_token.expose(), seeded.access_token.expose());
		assert_eq!(service.requests(), 1);
		assert_eq!(service.log()[0].path, "/v2/me");
	}

	#[tokio::test]
	async fn transport_failures_leave_the_state_alone() {
		let (authenticator, service) = fake_authenticator();

		service.go_offline();

		let err = authenticator
			.verify_credential(service.seed_credential())
			.await
			.expect_err("Offline service cannot verify.");

		assert!(matches!(err, Error::Transport(TransportError::Network { .. })));
		assert_eq!(authenticator.state(), AuthState::Unauthenticated);
	}

	#[tokio::test]
	async fn profile_outage_after_rotation_hands_back_the_rotated_pair() {
		let (authenticator, service) = fake_authenticator();
		let record = store::serialize(&service.seed_credential());

		service.fail_path("/v2/me", 503);

		let err = authenticator
			.authenticate_from_persisted_credential(&record)
			.await
			.expect_err("The profile load fails.");

		assert!(!err.is_authentication_failure());
		assert_eq!(authenticator.state(), AuthState::Unauthenticated);

		let rotated = err.into_issued_credential().expect("The rotated pair is handed back.");
		let rotated_record = store::serialize(&rotated);

		assert_ne!(rotated_record, record);

		service.restore_path("/v2/me");

		// The original record is spent; the rotated one keeps the session going.
		let user = authenticator
			.authenticate_from_persisted_credential(&rotated_record)
			.await
			.expect("The rotated record verifies.");

		assert_eq!(user.id().get(), FAKE_USER_ID);
		assert_eq!(authenticator.state(), AuthState::Authenticated);
	}

	#[tokio::test]
	async fn profile_outage_without_rotation_returns_the_plain_error() {
		let (authenticator, service) = fake_authenticator();
		let seeded = service.seed_credential();
		let access_only = Credential::builder()
			.access_token(seeded.access_token.expose())
			.build()
			.expect("Access-only credential builds.");

		service.fail_path("/v2/me", 503);

		let err = authenticator.verify_credential(access_only).await.expect_err("Outage surfaces.");

		assert!(matches!(err, Error::Transport(TransportError::Status { status: 503, .. })));
	}

	#[tokio::test]
	async fn tokens_rotated_by_the_profile_endpoint_are_kept() {
		let (authenticator, service) = fake_authenticator();
		let seeded = service.seed_credential();
		let access_only = Credential::builder()
			.access_token(seeded.access_token.expose())
			.build()
			.expect("Access-only credential builds.");

		service.rotate_on_profile();

		let user = authenticator.verify_credential(access_only).await.expect("Access token is live.");

		assert_ne!(user.credential().access_token.expose(), seeded.access_token.expose());
		assert!(user.credential().refresh_token.is_some());
		assert!(user.credential().expires_at.is_some());
		assert_eq!(service.requests(), 1);

		let rotated_record = user.credential_record();

		drop(user);

		// The pair from `GET /me` is the one that rotates next time.
		authenticator
			.authenticate_from_persisted_credential(&rotated_record)
			.await
			.expect("The pair issued by the profile endpoint verifies.");
	}

	#[tokio::test]
	async fn restoring_after_requesting_authorization_is_allowed() {
		let (authenticator, service) = fake_authenticator();
		let redirect = Url::parse("app://auth").expect("Redirect fixture parses.");

		authenticator.authorization_url(Some(&redirect)).expect("Authorize URL builds.");

		assert_eq!(authenticator.state(), AuthState::AuthorizationRequested);

		authenticator
			.verify_credential(service.seed_credential())
			.await
			.expect("A restored credential supersedes the pending authorization.");

		assert_eq!(authenticator.state(), AuthState::Authenticated);
	}

	#[tokio::test]
	async fn malformed_records_fail_before_any_request() {
		let (authenticator, service) = fake_authenticator();
		let err = authenticator
			.authenticate_from_persisted_credential(&CredentialRecord::default())
			.await
			.expect_err("Empty records are malformed.");

		assert!(matches!(err, Error::MalformedCredential { .. }));
		assert_eq!(service.requests(), 0);
		assert_eq!(authenticator.state(), AuthState::Unauthenticated);
	}

	#[tokio::test]
	async fn in_place_verification_rotates_and_revokes() {
		let (mut user, service) = fake_user();
		let before = user.credential_record();

		user.verify().await.expect("Live users re-verify.");

		assert_ne!(user.credential_record(), before);
		assert_eq!(user.profile().full_name.as_deref(), Some("Paul Atreides"));

		service.fail_path("/oauth/token", 401);

		let err = user.verify().await.expect_err("Rejected rotation must fail.");

		assert!(err.is_authentication_failure());
		assert_eq!(user.session().state(), AuthState::Revoked);
		assert!(matches!(user.verify().await, Err(Error::SessionRevoked)));
	}

	#[tokio::test]
	async fn free_function_restores_in_a_fresh_session() {
		let service = FakeService::default();
		let record = store::serialize(&service.seed_credential());
		let config = fake_config_builder().build().expect("Fake configuration is valid.");
		let user: FakeUser = authenticate_with_record(
			config,
			Arc::new(service.clone()),
			Arc::new(service.clone()),
			&record,
		)
		.await
		.expect("Record verifies.");

		assert!(user.session().is_authenticated());
	}

	#[tokio::test]
	async fn callback_form_reports_rejections() {
		let (authenticator, _service) = fake_authenticator();
		let failures = Arc::new(Mutex::new(Vec::new()));
		let sink = failures.clone();
		let stale = Credential::builder()
			.access_token("stale")
			.refresh_token("stale")
			.build()
			.expect("Stale credential builds.");
		let target: Arc<dyn Completion<AuthenticationOutcome<FakeService, FakeService>>> =
			Arc::new(move |outcome: AuthenticationOutcome<FakeService, FakeService>| {
				if let AuthenticationOutcome::Failed(e) = outcome {
					sink.lock().push(e.is_authentication_failure());
				}
			});

		authenticator.verify_credential_with(stale, target).await;

		assert_eq!(*failures.lock(), vec![true]);
		assert_eq!(authenticator.api.dispatcher.in_flight(), 0);
	}
}
