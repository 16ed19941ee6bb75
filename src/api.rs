//! Resource calls against the service API.
//!
//! [`Api`] bundles the configuration, the HTTP transport, the transport error mapper, and the
//! [`CallbackDispatcher`] shared by every flow. Resource requests are plain
//! [`oauth2::http`] requests executed on the same [`ApiHttpClient`] handle type that serves the
//! token endpoint, so one transport covers the whole SDK.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpResponse,
	http::{
		Method, Request, StatusCode,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc3339;
// self
use crate::{
	_prelude::*,
	auth::{BookId, TokenSecret},
	config::ApiConfiguration,
	dispatch::CallbackDispatcher,
	error::{ConfigError, TransportError},
	http::{ApiEndpoint, ApiHttpClient, ResponseMetadata, ResponseMetadataSlot},
	model::{Book, Highlight, NewBook, NewReading, ProfileResponse, Reading},
	oauth::{BasicFacade, TransportErrorMapper},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

const JSON: &str = "application/json";
const MAX_ERROR_MESSAGE_CHARS: usize = 256;

#[cfg(feature = "reqwest")]
/// [`Api`] specialized for the crate's default reqwest transport stack.
pub type ReqwestApi = Api<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Criterion used by `GET /books/match`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookCriterion<'a> {
	/// ISBN-like identifier.
	Identifier(&'a str),
	/// Exact title and author pair.
	TitleAuthor {
		/// Book title.
		title: &'a str,
		/// Book author.
		author: &'a str,
	},
}

/// Shared handle to the reading service.
pub struct Api<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Service endpoints and client identity.
	pub config: ApiConfiguration,
	/// HTTP client wrapper used for every outbound request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Registry of in-flight callback requests.
	pub dispatcher: CallbackDispatcher,
}
impl<C, M> Api<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a handle that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: ApiConfiguration,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			config,
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			dispatcher: CallbackDispatcher::default(),
		}
	}

	pub(crate) fn token_facade(&self) -> Result<BasicFacade<'_, C, M>> {
		BasicFacade::from_config(&self.config, &*self.http_client, &*self.transport_mapper)
	}

	/// `GET /me`; the response may carry a rotated token pair next to the profile.
	pub async fn fetch_profile(&self, token: &TokenSecret) -> Result<ProfileResponse> {
		let url = self.config.endpoint("me")?;

		self.get(ApiEndpoint::Profile, url, token).await
	}

	/// `GET /books/match`; `None` when the service reports no match (HTTP 404).
	pub async fn match_book(
		&self,
		token: &TokenSecret,
		criterion: BookCriterion<'_>,
	) -> Result<Option<Book>> {
		let mut url = self.config.endpoint("books/match")?;

		match criterion {
			BookCriterion::Identifier(identifier) => {
				url.query_pairs_mut().append_pair("q[identifier]", identifier);
			},
			BookCriterion::TitleAuthor { title, author } => {
				url.query_pairs_mut().append_pair("q[title]", title).append_pair("q[author]", author);
			},
		}

		self.get_optional(ApiEndpoint::Books, url, token).await
	}

	/// `POST /books`.
	pub(crate) async fn create_book(&self, token: &TokenSecret, book: &NewBook<'_>) -> Result<Book> {
		let url = self.config.endpoint("books")?;

		self.post(ApiEndpoint::Books, url, token, book).await
	}

	/// `GET /me/readings?book_id=`; the current user's reading for `book`, if any.
	///
	/// An empty list is the miss. Any non-2xx status, 404 included, is an error.
	pub async fn reading_for_book(
		&self,
		token: &TokenSecret,
		book: BookId,
	) -> Result<Option<Reading>> {
		let mut url = self.config.endpoint("me/readings")?;

		url.query_pairs_mut().append_pair("book_id", &book.to_string());

		let readings: Vec<Reading> = self.get(ApiEndpoint::Readings, url, token).await?;

		Ok(readings.into_iter().find(|reading| reading.book_id == book))
	}

	/// `POST /books/{id}/readings`.
	pub(crate) async fn create_reading(
		&self,
		token: &TokenSecret,
		book: BookId,
		reading: &NewReading<'_>,
	) -> Result<Reading> {
		let url = self.config.endpoint(&format!("books/{book}/readings"))?;

		self.post(ApiEndpoint::Readings, url, token, reading).await
	}

	/// `GET /me/highlights?count=&from=&to=`; raw records in service order.
	///
	/// An empty list is the miss. Any non-2xx status, 404 included, is an error.
	pub async fn highlights(
		&self,
		token: &TokenSecret,
		count: usize,
		from: OffsetDateTime,
		to: OffsetDateTime,
	) -> Result<Vec<Highlight>> {
		let mut url = self.config.endpoint("me/highlights")?;

		url.query_pairs_mut()
			.append_pair("count", &count.to_string())
			.append_pair("from", &format_instant(from)?)
			.append_pair("to", &format_instant(to)?);

		self.get(ApiEndpoint::Highlights, url, token).await
	}

	async fn get<T>(&self, endpoint: ApiEndpoint, url: Url, token: &TokenSecret) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let (response, meta) = self.send(endpoint, Method::GET, &url, token, None).await?;

		ensure_success(endpoint, &response, meta)?;

		decode(endpoint, response.body())
	}

	async fn get_optional<T>(
		&self,
		endpoint: ApiEndpoint,
		url: Url,
		token: &TokenSecret,
	) -> Result<Option<T>>
	where
		T: DeserializeOwned,
	{
		let (response, meta) = self.send(endpoint, Method::GET, &url, token, None).await?;

		if response.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}

		ensure_success(endpoint, &response, meta)?;

		decode(endpoint, response.body()).map(Some)
	}

	async fn post<B, T>(
		&self,
		endpoint: ApiEndpoint,
		url: Url,
		token: &TokenSecret,
		body: &B,
	) -> Result<T>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		let payload = serde_json::to_vec(body).map_err(|e| TransportError::Unexpected {
			endpoint,
			message: format!("request body could not be encoded: {e}"),
		})?;
		let (response, meta) =
			self.send(endpoint, Method::POST, &url, token, Some(payload)).await?;

		ensure_success(endpoint, &response, meta)?;

		decode(endpoint, response.body())
	}

	async fn send(
		&self,
		endpoint: ApiEndpoint,
		method: Method,
		url: &Url,
		token: &TokenSecret,
		body: Option<Vec<u8>>,
	) -> Result<(HttpResponse, Option<ResponseMetadata>)> {
		let mut builder = Request::builder()
			.method(method)
			.uri(url.as_str())
			.header(ACCEPT, JSON)
			.header(AUTHORIZATION, token.bearer());

		if body.is_some() {
			builder = builder.header(CONTENT_TYPE, JSON);
		}

		let request = builder.body(body.unwrap_or_default()).map_err(ConfigError::from)?;
		let slot = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(slot.clone());
		let response = handle.call(request).await.map_err(|err| {
			self.transport_mapper.map_transport_error(endpoint, slot.take().as_ref(), err)
		})?;

		Ok((response, slot.take()))
	}
}
#[cfg(feature = "reqwest")]
impl Api<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a handle backed by a fresh reqwest transport.
	pub fn new(config: ApiConfiguration) -> Self {
		Self::with_http_client(config, ReqwestHttpClient::default(), ReqwestTransportErrorMapper)
	}
}
impl<C, M> Debug for Api<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Api")
			.field("config", &self.config)
			.field("in_flight", &self.dispatcher.in_flight())
			.finish()
	}
}

fn ensure_success(
	endpoint: ApiEndpoint,
	response: &HttpResponse,
	meta: Option<ResponseMetadata>,
) -> Result<()> {
	let status = response.status();

	if status.is_success() {
		return Ok(());
	}

	let message = error_message(response.body());

	if status == StatusCode::UNAUTHORIZED {
		return Err(Error::AuthenticationFailed { reason: message });
	}

	Err(TransportError::Status {
		endpoint,
		status: status.as_u16(),
		message,
		retry_after: meta.and_then(|value| value.retry_after),
	}
	.into())
}

fn decode<T>(endpoint: ApiEndpoint, body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| TransportError::Decode { endpoint, source }.into())
}

/// Prefers the service's `error`/`message` fields and falls back to the raw body.
fn error_message(body: &[u8]) -> String {
	#[derive(Deserialize)]
	struct ErrorBody {
		#[serde(alias = "message")]
		error: String,
	}

	if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
		return parsed.error;
	}

	let text = String::from_utf8_lossy(body);
	let trimmed = text.trim();

	if trimmed.is_empty() {
		return "empty response body".into();
	}

	trimmed.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
}

fn format_instant(instant: OffsetDateTime) -> Result<String> {
	instant
		.format(&Rfc3339)
		.map_err(|e| Error::validation(format!("instant {instant} cannot be sent: {e}")))
}
