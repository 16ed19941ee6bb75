//! Async client SDK for a social-reading service: OAuth sign-in with rotating credentials and
//! find-or-create resolution for books, readings, and highlights.
//!
//! Start with [`flows::Authenticator`]: build the authorize URL, hand the callback URL back,
//! and receive a [`model::User`]. Persist [`model::User::credential_record`] after every
//! verification; the refresh token inside it is single-use.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod flows;
pub mod http;
pub mod model;
pub mod oauth;
pub mod obs;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and an in-process fake of the reading service for tests; enabled
	//! via `cfg(test)` or the `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::HashSet,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// crates.io
	use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, http::StatusCode};
	// self
	use crate::{
		api::Api,
		auth::{AuthState, BookId, Credential, HighlightId, ReadingId, UserId},
		config::{ApiConfiguration, ApiConfigurationBuilder},
		error::{ConfigError, TransportError},
		flows::Authenticator,
		http::{ApiEndpoint, ApiHttpClient, ResponseMetadata, ResponseMetadataSlot},
		model::{Book, Highlight, Reading, ReadingState, User, UserProfile},
		oauth::TransportErrorMapper,
	};

	/// Client identifier registered with the fake service.
	pub const FAKE_CLIENT_ID: &str = "fake-client";
	/// Identifier of the only user known to the fake service.
	pub const FAKE_USER_ID: u64 = 3;
	/// Authorization code the fake service accepts once.
	pub const FAKE_CODE: &str = "ABC123";

	/// Authenticator wired to a [`FakeService`].
	pub type FakeAuthenticator = Authenticator<FakeService, FakeService>;
	/// User wired to a [`FakeService`].
	pub type FakeUser = User<FakeService, FakeService>;

	/// Transport error raised when the fake service is offline.
	#[derive(Debug, ThisError)]
	#[error("{0}")]
	pub struct FakeTransportError(pub String);

	/// One request observed by the fake service.
	#[derive(Clone, Debug)]
	pub struct FakeRequest {
		/// HTTP method.
		pub method: String,
		/// URL path.
		pub path: String,
		/// Decoded query and form parameters.
		pub params: HashMap<String, String>,
		/// Decoded JSON body, for resource writes.
		pub json: Option<serde_json::Value>,
	}

	/// In-process reading service speaking the same HTTP contract as the real one.
	///
	/// Authorization codes and refresh tokens are single-use; every refresh rotates both tokens.
	#[derive(Clone, Default)]
	pub struct FakeService(Arc<FakeInner>);
	impl FakeService {
		/// Number of requests that reached the transport.
		pub fn requests(&self) -> usize {
			self.0.requests.load(Ordering::SeqCst)
		}

		/// Requests observed so far, oldest first.
		pub fn log(&self) -> Vec<FakeRequest> {
			self.0.state.lock().log.clone()
		}

		/// Registers a live token pair and returns the matching credential.
		pub fn seed_credential(&self) -> Credential {
			let mut state = self.0.state.lock();
			let (access, refresh) = state.issue_pair();

			Credential::builder()
				.access_token(access)
				.refresh_token(refresh)
				.expires_in(Duration::hours(1))
				.build()
				.expect("Seeded credential should build.")
		}

		/// Adds a book to the catalog and returns it.
		pub fn seed_book(&self, identifier: Option<&str>, title: &str, author: &str) -> Book {
			let mut state = self.0.state.lock();
			let book = Book {
				id: Some(BookId::new(state.next_id()).expect("Fake ids start at one.")),
				identifier: identifier.map(str::to_owned),
				title: title.into(),
				author: author.into(),
				permalink: None,
			};

			state.books.push(book.clone());

			book
		}

		/// Adds a reading of `book` for the fake user and returns it.
		pub fn seed_reading(&self, book: &Book, reading_state: ReadingState, private: bool) -> Reading {
			let mut state = self.0.state.lock();
			let reading = Reading {
				id: ReadingId::new(state.next_id()).expect("Fake ids start at one."),
				user_id: UserId::new(FAKE_USER_ID).ok(),
				book_id: book.id.expect("Seeded books carry ids."),
				state: reading_state,
				is_private: private,
				connections: Vec::new(),
				permalink: None,
			};

			state.readings.push(reading.clone());

			reading
		}

		/// Adds a highlight made at `at`.
		pub fn seed_highlight(&self, content: &str, at: OffsetDateTime) {
			let mut state = self.0.state.lock();
			let highlight = Highlight {
				id: HighlightId::new(state.next_id()).expect("Fake ids start at one."),
				reading_id: None,
				content: content.into(),
				highlighted_at: at,
				position: None,
				permalink: None,
			};

			state.highlights.push(highlight);
		}

		/// Makes every following request fail at the transport level.
		pub fn go_offline(&self) {
			self.0.state.lock().offline = true;
		}

		/// Answers every following request to `path` with `status`.
		pub fn fail_path(&self, path: &str, status: u16) {
			self.0.state.lock().failures.insert(path.into(), status);
		}

		/// Stops injecting failures into requests to `path`.
		pub fn restore_path(&self, path: &str) {
			self.0.state.lock().failures.remove(path);
		}

		/// Makes `GET /me` rotate the token pair and return it next to the profile.
		pub fn rotate_on_profile(&self) {
			self.0.state.lock().rotate_on_profile = true;
		}

		/// Stops issuing refresh tokens on rotation.
		pub fn withhold_refresh_tokens(&self) {
			self.0.state.lock().withhold_refresh = true;
		}

		fn respond(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError<FakeTransportError>> {
			self.0.requests.fetch_add(1, Ordering::SeqCst);

			let mut state = self.0.state.lock();
			let logged = FakeRequest::from_http(&request);

			state.log.push(logged.clone());

			if state.offline {
				return Err(HttpClientError::Reqwest(Box::new(FakeTransportError(
					"service unreachable".into(),
				))));
			}
			if let Some(status) = state.failures.get(&logged.path) {
				return Ok(json_response(*status, &serde_json::json!({ "error": "injected failure" })));
			}
			if logged.path == "/oauth/token" {
				return Ok(state.token(&logged));
			}

			let authorized = request
				.headers()
				.get(oauth2::http::header::AUTHORIZATION)
				.and_then(|value| value.to_str().ok())
				.and_then(|value| value.strip_prefix("Bearer "))
				.is_some_and(|token| state.access_tokens.contains(token));

			if !authorized {
				return Ok(json_response(401, &serde_json::json!({ "error": "invalid_token" })));
			}

			Ok(state.resource(&logged))
		}
	}
	impl ApiHttpClient for FakeService {
		type Handle = FakeHandle;
		type TransportError = FakeTransportError;

		fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
			FakeHandle { service: self.clone(), slot }
		}
	}
	impl TransportErrorMapper<FakeTransportError> for FakeService {
		fn map_transport_error(
			&self,
			endpoint: ApiEndpoint,
			_metadata: Option<&ResponseMetadata>,
			error: HttpClientError<FakeTransportError>,
		) -> Error {
			match error {
				HttpClientError::Reqwest(inner) => TransportError::network(*inner).into(),
				HttpClientError::Http(inner) => ConfigError::from(inner).into(),
				HttpClientError::Io(inner) => TransportError::Io(inner).into(),
				HttpClientError::Other(message) => TransportError::Unexpected { endpoint, message }.into(),
				_ => TransportError::Unexpected { endpoint, message: "unclassified".into() }.into(),
			}
		}
	}

	/// Request handle for [`FakeService`].
	pub struct FakeHandle {
		service: FakeService,
		slot: ResponseMetadataSlot,
	}
	impl<'c> AsyncHttpClient<'c> for FakeHandle {
		type Error = HttpClientError<FakeTransportError>;
		type Future =
			Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

		fn call(&'c self, request: HttpRequest) -> Self::Future {
			let service = self.service.clone();
			let slot = self.slot.clone();

			Box::pin(async move {
				slot.take();

				let response = service.respond(request)?;

				slot.store(ResponseMetadata { status: Some(response.status().as_u16()), retry_after: None });

				Ok(response)
			})
		}
	}

	#[derive(Default)]
	struct FakeInner {
		requests: AtomicUsize,
		state: Mutex<FakeState>,
	}

	struct FakeState {
		codes: HashSet<String>,
		access_tokens: HashSet<String>,
		refresh_tokens: HashSet<String>,
		books: Vec<Book>,
		readings: Vec<Reading>,
		highlights: Vec<Highlight>,
		log: Vec<FakeRequest>,
		failures: HashMap<String, u16>,
		offline: bool,
		withhold_refresh: bool,
		rotate_on_profile: bool,
		next_id: u64,
	}
	impl FakeState {
		fn next_id(&mut self) -> u64 {
			self.next_id += 1;

			self.next_id
		}

		fn issue_pair(&mut self) -> (String, String) {
			let n = self.next_id();
			let access = format!("access-{n}");
			let refresh = format!("refresh-{n}");

			self.access_tokens.insert(access.clone());
			self.refresh_tokens.insert(refresh.clone());

			(access, refresh)
		}

		fn token(&mut self, request: &FakeRequest) -> HttpResponse {
			let param = |key: &str| request.params.get(key).map(String::as_str);

			if param("client_id") != Some(FAKE_CLIENT_ID) {
				return json_response(400, &serde_json::json!({ "error": "invalid_client" }));
			}

			let accepted = match param("grant_type") {
				Some("authorization_code") =>
					param("code").is_some_and(|code| self.codes.remove(code)),
				Some("refresh_token") =>
					param("refresh_token").is_some_and(|token| self.refresh_tokens.remove(token)),
				_ => return json_response(400, &serde_json::json!({ "error": "unsupported_grant_type" })),
			};

			if !accepted {
				return json_response(400, &serde_json::json!({ "error": "invalid_grant" }));
			}

			let rotating = param("grant_type") == Some("refresh_token");
			let (access, refresh) = self.issue_pair();

			if rotating && self.withhold_refresh {
				self.refresh_tokens.remove(&refresh);

				return json_response(
					200,
					&serde_json::json!({ "access_token": access, "token_type": "bearer", "expires_in": 3600 }),
				);
			}

			json_response(
				200,
				&serde_json::json!({
					"access_token": access,
					"refresh_token": refresh,
					"token_type": "bearer",
					"expires_in": 3600,
				}),
			)
		}

		fn resource(&mut self, request: &FakeRequest) -> HttpResponse {
			let param = |key: &str| request.params.get(key).cloned();

			match (request.method.as_str(), request.path.as_str()) {
				("GET", "/v2/me") => {
					let mut profile = serde_json::json!({
						"id": FAKE_USER_ID,
						"username": "paul",
						"fullname": "Paul Atreides",
						"avatar_url": "https://static.reading.test/avatars/3/paul_medium.png",
						"reading": 1,
					});

					if self.rotate_on_profile {
						let (access, refresh) = self.issue_pair();

						profile["access_token"] = access.into();
						profile["refresh_token"] = refresh.into();
						profile["expires_in"] = 3600.into();
					}

					json_response(200, &profile)
				},
				("GET", "/v2/books/match") => {
					let identifier = param("q[identifier]");
					let title = param("q[title]");
					let author = param("q[author]");
					let found = self.books.iter().find(|book| match (&identifier, &title, &author) {
						(Some(identifier), _, _) => book.identifier.as_ref() == Some(identifier),
						(None, Some(title), Some(author)) =>
							&book.title == title && &book.author == author,
						_ => false,
					});

					match found {
						Some(book) => json_response(200, book),
						None => json_response(404, &serde_json::json!({ "error": "not found" })),
					}
				},
				("POST", "/v2/books") => {
					let body = request.json.clone().unwrap_or_default();
					let text = |key: &str| body.get(key).and_then(|v| v.as_str()).map(str::to_owned);
					let book = Book {
						id: BookId::new(self.next_id()).ok(),
						identifier: text("identifier"),
						title: text("title").unwrap_or_default(),
						author: text("author").unwrap_or_default(),
						permalink: None,
					};

					self.books.push(book.clone());

					json_response(201, &book)
				},
				("GET", "/v2/me/readings") => {
					let wanted = param("book_id");
					let readings: Vec<&Reading> = self
						.readings
						.iter()
						.filter(|reading| Some(reading.book_id.to_string()) == wanted)
						.collect();

					json_response(200, &readings)
				},
				("POST", path) if path.starts_with("/v2/books/") && path.ends_with("/readings") => {
					let raw_id = path.trim_start_matches("/v2/books/").trim_end_matches("/readings");
					let Ok(book_id) = raw_id.parse::<BookId>() else {
						return json_response(404, &serde_json::json!({ "error": "no such book" }));
					};
					let body = request.json.clone().unwrap_or_default();
					let reading = Reading {
						id: match ReadingId::new(self.next_id()) {
							Ok(id) => id,
							Err(_) => return json_response(500, &serde_json::json!({})),
						},
						user_id: UserId::new(FAKE_USER_ID).ok(),
						book_id,
						state: serde_json::from_value(body["state"].clone())
							.unwrap_or(ReadingState::Interesting),
						is_private: body["private"].as_bool().unwrap_or(false),
						connections: match body.get("connections") {
							Some(value) => serde_json::from_value(value.clone()).unwrap_or_default(),
							None => Vec::new(),
						},
						permalink: None,
					};

					self.readings.push(reading.clone());

					json_response(201, &reading)
				},
				("GET", "/v2/me/highlights") => {
					let parse = |key: &str| {
						param(key).and_then(|raw| {
							OffsetDateTime::parse(&raw, &time::format_description::well_known::Rfc3339).ok()
						})
					};
					let (Some(from), Some(to)) = (parse("from"), parse("to")) else {
						return json_response(400, &serde_json::json!({ "error": "bad range" }));
					};
					let count = param("count").and_then(|raw| raw.parse::<usize>().ok()).unwrap_or(20);
					let mut found: Vec<&Highlight> = self
						.highlights
						.iter()
						.filter(|highlight| highlight.highlighted_at >= from && highlight.highlighted_at < to)
						.collect();

					// Oldest first, so the client has to order the page itself.
					found.sort_by_key(|highlight| highlight.highlighted_at);
					found.truncate(count);

					json_response(200, &found)
				},
				_ => json_response(404, &serde_json::json!({ "error": "no route" })),
			}
		}
	}
	impl Default for FakeState {
		fn default() -> Self {
			Self {
				codes: HashSet::from_iter([FAKE_CODE.to_owned()]),
				access_tokens: HashSet::new(),
				refresh_tokens: HashSet::new(),
				books: Vec::new(),
				readings: Vec::new(),
				highlights: Vec::new(),
				log: Vec::new(),
				failures: HashMap::new(),
				offline: false,
				withhold_refresh: false,
				rotate_on_profile: false,
				next_id: 100,
			}
		}
	}

	impl FakeRequest {
		fn from_http(request: &HttpRequest) -> Self {
			let uri = request.uri();
			let mut params: HashMap<String, String> = uri
				.query()
				.map(|query| url::form_urlencoded::parse(query.as_bytes()).into_owned().collect())
				.unwrap_or_default();
			let mut json = None;

			if !request.body().is_empty() {
				match serde_json::from_slice::<serde_json::Value>(request.body()) {
					Ok(value) => json = Some(value),
					Err(_) => params.extend(url::form_urlencoded::parse(request.body()).into_owned()),
				}
			}

			Self { method: request.method().to_string(), path: uri.path().to_owned(), params, json }
		}
	}

	fn json_response<T>(status: u16, body: &T) -> HttpResponse
	where
		T: ?Sized + Serialize,
	{
		let mut response =
			HttpResponse::new(serde_json::to_vec(body).expect("Fake bodies always serialize."));

		*response.status_mut() = StatusCode::from_u16(status).expect("Fake statuses are valid.");
		response.headers_mut().insert(
			oauth2::http::header::CONTENT_TYPE,
			oauth2::http::HeaderValue::from_static("application/json"),
		);

		response
	}

	/// Configuration pointing at the fake service's hosts.
	pub fn fake_config_builder() -> ApiConfigurationBuilder {
		ApiConfiguration::builder(FAKE_CLIENT_ID)
			.api_base(Url::parse("https://api.reading.test/v2/").expect("Fake API base parses."))
			.authorization_endpoint(
				Url::parse("https://reading.test/oauth/authorize").expect("Fake authorize parses."),
			)
			.token_endpoint(Url::parse("https://reading.test/oauth/token").expect("Fake token parses."))
	}

	/// Authenticator and fake service with the default fake configuration.
	pub fn fake_authenticator() -> (FakeAuthenticator, FakeService) {
		fake_authenticator_with(|builder| builder)
	}

	/// Authenticator and fake service with a customized configuration.
	pub fn fake_authenticator_with(
		customize: impl FnOnce(ApiConfigurationBuilder) -> ApiConfigurationBuilder,
	) -> (FakeAuthenticator, FakeService) {
		let service = FakeService::default();
		let config = customize(fake_config_builder()).build().expect("Fake configuration is valid.");
		let authenticator =
			Authenticator::with_http_client(config, Arc::new(service.clone()), Arc::new(service.clone()));

		(authenticator, service)
	}

	/// Authenticated user holding a seeded credential; no request has been issued yet.
	pub fn fake_user() -> (FakeUser, FakeService) {
		let (authenticator, service) = fake_authenticator();
		let session = authenticator.session().clone();

		session.transition(AuthState::Authenticated).expect("Seeded sessions start authenticated.");

		let profile: UserProfile = serde_json::from_value(serde_json::json!({
			"id": FAKE_USER_ID,
			"username": "paul",
		}))
		.expect("Fake profile decodes.");
		let api: Arc<Api<FakeService, FakeService>> = authenticator.api.clone();
		let user = User::new(api, session, profile, service.seed_credential());

		(user, service)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
