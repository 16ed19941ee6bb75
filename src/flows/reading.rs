//! The current user's reading of a book.
//!
//! An existing reading always wins: when the user already has one for the book it is returned
//! as stored, and the requested state, privacy, and connections are ignored.

// self
use crate::{
	_prelude::*,
	auth::{BookId, ConnectionId},
	dispatch::{Completion, ReadingOutcome},
	flows::{ResolveFuture, ResolveMode, ResolveStrategy, Resolution, observed, resolve},
	http::ApiHttpClient,
	model::{Book, NewReading, Reading, ReadingState, User},
	oauth::TransportErrorMapper,
	obs::FlowKind,
};

struct ReadingStrategy<'a, C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	user: &'a User<C, M>,
	book: BookId,
	draft: NewReading<'a>,
}
impl<C, M> ResolveStrategy for ReadingStrategy<'_, C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	type Criterion = BookId;
	type Resource = Reading;

	fn criteria(&self) -> Result<Vec<BookId>> {
		Ok(vec![self.book])
	}

	fn find<'b>(&'b self, book: &'b BookId) -> ResolveFuture<'b, Option<Reading>> {
		Box::pin(self.user.api.reading_for_book(&self.user.credential().access_token, *book))
	}

	fn create(&self) -> ResolveFuture<'_, Reading> {
		Box::pin(self.user.api.create_reading(
			&self.user.credential().access_token,
			self.book,
			&self.draft,
		))
	}
}

impl<C, M> User<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns the user's reading of `book`, or [`Resolution::NotFound`].
	pub async fn find_reading(&self, book: &Book) -> Result<Resolution<Reading>> {
		// Lookups never create, so the draft is never sent.
		let draft = NewReading { state: ReadingState::Interesting, private: false, connections: None };

		self.resolve_reading(book, draft, ResolveMode::FindOnly, "find_reading").await
	}

	/// Returns the user's reading of `book`, creating it when none exists.
	///
	/// `state`, `is_private`, and `connections` apply only to a newly created reading.
	/// `connections: None` lets the service post to the user's default connections;
	/// `Some(&[])` posts to none. `book` must carry a remote id.
	pub async fn find_or_create_reading(
		&self,
		book: &Book,
		state: ReadingState,
		is_private: bool,
		connections: Option<&[ConnectionId]>,
	) -> Result<Resolution<Reading>> {
		let draft = NewReading { state, private: is_private, connections };

		self.resolve_reading(book, draft, ResolveMode::FindOrCreate, "find_or_create_reading").await
	}

	/// Callback form of [`Self::find_reading`].
	pub fn find_reading_with(
		&self,
		book: Book,
		target: Arc<dyn Completion<ReadingOutcome>>,
	) -> impl Future<Output = ()> + Send + '_ {
		let pending = self.api.dispatcher.register(FlowKind::Reading, target);

		async move {
			let result = self.find_reading(&book).await;

			pending.dispatch(reading_outcome(book, result));
		}
	}

	/// Callback form of [`Self::find_or_create_reading`].
	pub fn find_or_create_reading_with(
		&self,
		book: Book,
		state: ReadingState,
		is_private: bool,
		connections: Option<Vec<ConnectionId>>,
		target: Arc<dyn Completion<ReadingOutcome>>,
	) -> impl Future<Output = ()> + Send + '_ {
		let pending = self.api.dispatcher.register(FlowKind::Reading, target);

		async move {
			let result = self
				.find_or_create_reading(&book, state, is_private, connections.as_deref())
				.await;

			pending.dispatch(reading_outcome(book, result));
		}
	}

	async fn resolve_reading(
		&self,
		book: &Book,
		draft: NewReading<'_>,
		mode: ResolveMode,
		stage: &'static str,
	) -> Result<Resolution<Reading>> {
		observed(FlowKind::Reading, stage, Resolution::flow_outcome, async move {
			self.session.ensure_live()?;

			let book = book.require_id()?;

			resolve(&ReadingStrategy { user: self, book, draft }, mode).await
		})
		.await
	}
}

fn reading_outcome(book: Book, result: Result<Resolution<Reading>>) -> ReadingOutcome {
	match result {
		Ok(Resolution::Found(reading)) => ReadingOutcome::Found { reading, book, created: false },
		Ok(Resolution::Created(reading)) => ReadingOutcome::Found { reading, book, created: true },
		Ok(Resolution::NotFound) => ReadingOutcome::NotFound { book },
		Err(error) => ReadingOutcome::Failed { book, error },
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, error::TransportError, http::ApiEndpoint};

	#[tokio::test]
	async fn existing_readings_are_returned_unchanged() {
		let (user, service) = fake_user();
		let book = service.seed_book(None, "Dune", "Frank Herbert");
		let existing = service.seed_reading(&book, ReadingState::Finished, true);
		let resolution = user
			.find_or_create_reading(&book, ReadingState::Reading, false, None)
			.await
			.expect("Lookup succeeds.");

		assert_eq!(resolution, Resolution::Found(existing));
		assert!(service.log().iter().all(|request| request.method == "GET"));
	}

	#[tokio::test]
	async fn new_readings_omit_connections_unless_given() {
		let (user, service) = fake_user();
		let book = service.seed_book(None, "Dune", "Frank Herbert");
		let created = user
			.find_or_create_reading(&book, ReadingState::Reading, true, None)
			.await
			.expect("Creation succeeds.");
		let reading = created.as_inner().expect("Created readings are returned.");

		assert!(created.was_created());
		assert_eq!(reading.state, ReadingState::Reading);
		assert!(reading.is_private);
		assert_eq!(reading.book_id, book.require_id().expect("Seeded books carry ids."));

		let post = service.log().pop().expect("Creation was logged.");

		assert_eq!(post.path, format!("/v2/books/{}/readings", reading.book_id));
		assert_eq!(post.json, Some(serde_json::json!({ "state": "reading", "private": true })));
	}

	#[tokio::test]
	async fn explicit_connections_are_posted() {
		let (user, service) = fake_user();
		let book = service.seed_book(None, "Emma", "Jane Austen");
		let twitter = ConnectionId::new("twitter-12").expect("Connection id is valid.");

		user.find_or_create_reading(
			&book,
			ReadingState::Interesting,
			false,
			Some(std::slice::from_ref(&twitter)),
		)
		.await
		.expect("Creation succeeds.");

		let post = service.log().pop().expect("Creation was logged.");

		assert_eq!(
			post.json.map(|body| body["connections"].clone()),
			Some(serde_json::json!(["twitter-12"]))
		);
	}

	#[tokio::test]
	async fn find_only_reports_missing_readings() {
		let (user, service) = fake_user();
		let book = service.seed_book(None, "Dune", "Frank Herbert");

		assert_eq!(
			user.find_reading(&book).await.expect("Misses are not errors."),
			Resolution::NotFound
		);
		assert_eq!(service.requests(), 1);
	}

	#[tokio::test]
	async fn missing_reading_routes_fail_instead_of_creating() {
		let (user, service) = fake_user();
		let book = service.seed_book(None, "Dune", "Frank Herbert");

		service.fail_path("/v2/me/readings", 404);

		let err = user
			.find_or_create_reading(&book, ReadingState::Reading, false, None)
			.await
			.expect_err("A 404 from the readings list is an error.");

		assert!(matches!(
			err,
			Error::Transport(TransportError::Status { endpoint: ApiEndpoint::Readings, status: 404, .. })
		));
		assert!(service.log().iter().all(|request| request.method == "GET"));
	}

	#[tokio::test]
	async fn drafts_without_remote_ids_are_rejected() {
		let (user, service) = fake_user();
		let draft = Book {
			id: None,
			identifier: None,
			title: "Draft".into(),
			author: "Nobody".into(),
			permalink: None,
		};
		let err = user
			.find_or_create_reading(&draft, ReadingState::Reading, false, None)
			.await
			.expect_err("Drafts cannot be read.");

		assert!(matches!(err, Error::Validation { .. }));
		assert_eq!(service.requests(), 0);
	}

	#[tokio::test]
	async fn callback_form_carries_the_book() {
		let (user, service) = fake_user();
		let book = service.seed_book(None, "Dune", "Frank Herbert");
		let outcomes = Arc::new(Mutex::new(Vec::new()));
		let sink = outcomes.clone();
		let target: Arc<dyn Completion<ReadingOutcome>> = Arc::new(move |outcome: ReadingOutcome| {
			if let ReadingOutcome::NotFound { book } = outcome {
				sink.lock().push(book.title);
			}
		});

		user.find_reading_with(book, target).await;

		assert_eq!(*outcomes.lock(), vec![String::from("Dune")]);
	}
}
