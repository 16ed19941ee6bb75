#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use reading_sdk::{
	auth::{AuthState, Credential},
	config::ApiConfiguration,
	error::{Error, TransportError},
	flows::{ReqwestAuthenticator, authenticate_with_record},
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	reqwest,
	store::{self, REFRESH_TOKEN_KEY},
	url::Url,
};

const CLIENT_ID: &str = "client-it";
const PROFILE: &str = r#"{"id":3,"username":"paul","fullname":"Paul Atreides"}"#;

fn configuration(server: &MockServer) -> ApiConfiguration {
	let url = |path: &str| Url::parse(&server.url(path)).expect("Mock URL should parse.");

	ApiConfiguration::builder(CLIENT_ID)
		.api_base(url("/v2/"))
		.authorization_endpoint(url("/oauth/authorize"))
		.token_endpoint(url("/oauth/token"))
		.client_secret("secret-it")
		.allow_insecure(true)
		.build()
		.expect("Mock configuration should build.")
}

/// Accepts the self-signed certificate `httpmock` serves.
fn test_reqwest_http_client() -> ReqwestHttpClient {
	let client = reqwest::Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

fn authenticator(server: &MockServer) -> ReqwestAuthenticator {
	ReqwestAuthenticator::with_http_client(
		configuration(server),
		test_reqwest_http_client(),
		ReqwestTransportErrorMapper,
	)
}

fn token_body(access: &str, refresh: &str) -> String {
	format!(
		r#"{{"access_token":"{access}","refresh_token":"{refresh}","token_type":"bearer","expires_in":3600}}"#
	)
}

fn url(raw: &str) -> Url {
	Url::parse(raw).expect("URL fixture should parse.")
}

#[tokio::test]
async fn callback_exchange_loads_the_profile() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("fresh-access", "fresh-refresh"));
		})
		.await;
	let me = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/me").header("authorization", "Bearer fresh-access");
			then.status(200).header("content-type", "application/json").body(PROFILE);
		})
		.await;
	let authenticator = authenticator(&server);
	let base = url("app://auth");
	let authorize =
		authenticator.authorization_url(Some(&base)).expect("Authorize URL should build.");

	assert!(authorize.as_str().starts_with(&server.url("/oauth/authorize")));

	let user = authenticator
		.authenticate_callback(&url("app://auth?code=ABC123"), &base)
		.await
		.expect("Callback should authenticate.");

	token.assert_async().await;
	me.assert_async().await;

	assert_eq!(authenticator.state(), AuthState::Authenticated);
	assert_eq!(user.id().get(), 3);
	assert_eq!(user.credential().access_token.expose(), "fresh-access");
	assert_eq!(user.credential_record().get(REFRESH_TOKEN_KEY), Some("fresh-refresh"));
}

#[tokio::test]
async fn foreign_callbacks_never_reach_the_token_endpoint() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("unused", "unused"));
		})
		.await;
	let authenticator = authenticator(&server);
	let err = authenticator
		.exchange_authorization_code(&url("other://auth?code=ABC123"), &url("app://auth"))
		.await
		.expect_err("Foreign callbacks must be rejected.");

	assert!(matches!(err, Error::UrlMismatch { .. }));
	assert_eq!(authenticator.state(), AuthState::Unauthenticated);

	token.assert_calls_async(0).await;
}

#[tokio::test]
async fn rejected_codes_revoke_the_session() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_grant","error_description":"code expired"}"#);
		})
		.await;
	let authenticator = authenticator(&server);
	let err = authenticator
		.exchange_authorization_code(&url("app://auth?code=STALE"), &url("app://auth"))
		.await
		.expect_err("Expired codes must fail.");

	token.assert_async().await;

	assert!(err.is_authentication_failure());
	assert_eq!(authenticator.state(), AuthState::Revoked);
}

#[tokio::test]
async fn persisted_records_rotate_on_restore() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("rotated-access", "rotated-refresh"));
		})
		.await;
	let me = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/me").header("authorization", "Bearer rotated-access");
			then.status(200).header("content-type", "application/json").body(PROFILE);
		})
		.await;
	let persisted = store::serialize(
		&Credential::builder()
			.access_token("stored-access")
			.refresh_token("stored-refresh")
			.build()
			.expect("Stored credential should build."),
	);
	let user = authenticate_with_record(
		configuration(&server),
		Arc::new(test_reqwest_http_client()),
		Arc::new(ReqwestTransportErrorMapper),
		&persisted,
	)
	.await
	.expect("Stored record should verify.");

	token.assert_async().await;
	me.assert_async().await;

	let rotated = user.credential_record();

	assert_ne!(rotated, persisted);
	assert_eq!(rotated.get(REFRESH_TOKEN_KEY), Some("rotated-refresh"));
	assert_eq!(rotated.get(store::USER_ID_KEY), Some("3"));
}

#[tokio::test]
async fn tokens_rotated_by_the_profile_endpoint_are_kept() {
	let server = MockServer::start_async().await;
	let me = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/me").header("authorization", "Bearer stored-access");
			then.status(200).header("content-type", "application/json").body(
				r#"{"id":3,"username":"paul","access_token":"rot-access","refresh_token":"rot-refresh"}"#,
			);
		})
		.await;
	let credential = Credential::builder()
		.access_token("stored-access")
		.build()
		.expect("Access-only credential should build.");
	let user = authenticator(&server)
		.verify_credential(credential)
		.await
		.expect("Access-only credential should verify.");

	me.assert_async().await;

	assert_eq!(user.credential().access_token.expose(), "rot-access");
	assert_eq!(user.credential_record().get(REFRESH_TOKEN_KEY), Some("rot-refresh"));
}

#[tokio::test]
async fn profile_outage_after_rotation_returns_the_rotated_pair() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("rotated-access", "rotated-refresh"));
		})
		.await;
	let _me = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/me");
			then.status(503)
				.header("content-type", "application/json")
				.body(r#"{"error":"maintenance"}"#);
		})
		.await;
	let authenticator = authenticator(&server);
	let credential = Credential::builder()
		.access_token("stored-access")
		.refresh_token("stored-refresh")
		.build()
		.expect("Stored credential should build.");
	let err = authenticator
		.verify_credential(credential)
		.await
		.expect_err("The profile outage must surface.");

	token.assert_async().await;

	assert_eq!(authenticator.state(), AuthState::Unauthenticated);

	let rotated = store::serialize(
		err.issued_credential().expect("The rotated pair should be handed back."),
	);

	assert_eq!(rotated.get(REFRESH_TOKEN_KEY), Some("rotated-refresh"));
}

#[tokio::test]
async fn profile_rejection_after_rotation_revokes() {
	let server = MockServer::start_async().await;
	let _token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("rotated-access", "rotated-refresh"));
		})
		.await;
	let _me = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/me");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_token"}"#);
		})
		.await;
	let authenticator = authenticator(&server);
	let credential = Credential::builder()
		.access_token("stored-access")
		.refresh_token("stored-refresh")
		.build()
		.expect("Stored credential should build.");
	let err = authenticator
		.verify_credential(credential)
		.await
		.expect_err("Rejected profile loads must fail.");

	assert!(err.is_authentication_failure());
	assert_eq!(authenticator.state(), AuthState::Revoked);
}

#[tokio::test]
async fn token_outages_leave_the_state_alone() {
	let server = MockServer::start_async().await;
	let _token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(503)
				.header("content-type", "application/json")
				.header("retry-after", "30")
				.body(r#"{"error":"temporarily_unavailable"}"#);
		})
		.await;
	let authenticator = authenticator(&server);
	let credential = Credential::builder()
		.access_token("stored-access")
		.refresh_token("stored-refresh")
		.build()
		.expect("Stored credential should build.");
	let err = authenticator
		.verify_credential(credential)
		.await
		.expect_err("Outages must surface.");

	assert!(matches!(err, Error::Transport(TransportError::Status { status: 503, .. })));
	assert_eq!(authenticator.state(), AuthState::Unauthenticated);
}
