//! Book lookup and find-or-create.

// self
use crate::{
	_prelude::*,
	api::BookCriterion,
	dispatch::{BookOutcome, Completion},
	flows::{ResolveFuture, ResolveMode, ResolveStrategy, Resolution, observed, resolve},
	http::ApiHttpClient,
	model::{Book, NewBook, User},
	oauth::TransportErrorMapper,
	obs::FlowKind,
};

/// Search and creation criteria for a book.
///
/// A usable query carries an identifier, or a title together with an author. Blank strings
/// count as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookQuery {
	/// ISBN-like identifier; matched first when present.
	pub identifier: Option<String>,
	/// Exact title.
	pub title: Option<String>,
	/// Exact author.
	pub author: Option<String>,
}
impl BookQuery {
	/// Query matching by identifier only.
	pub fn by_identifier(identifier: impl Into<String>) -> Self {
		Self { identifier: Some(identifier.into()), ..Default::default() }
	}

	/// Query matching by title and author.
	pub fn by_title(title: impl Into<String>, author: impl Into<String>) -> Self {
		Self { identifier: None, title: Some(title.into()), author: Some(author.into()) }
	}

	/// Sets the identifier.
	pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
		self.identifier = Some(identifier.into());

		self
	}

	/// Sets the title.
	pub fn title(mut self, title: impl Into<String>) -> Self {
		self.title = Some(title.into());

		self
	}

	/// Sets the author.
	pub fn author(mut self, author: impl Into<String>) -> Self {
		self.author = Some(author.into());

		self
	}

	fn criteria(&self) -> Result<Vec<BookCriterion<'_>>> {
		let mut criteria = Vec::with_capacity(2);

		if let Some(identifier) = present(&self.identifier) {
			criteria.push(BookCriterion::Identifier(identifier));
		}
		if let Some((title, author)) = self.title_author() {
			criteria.push(BookCriterion::TitleAuthor { title, author });
		}
		if criteria.is_empty() {
			return Err(Error::validation("a book query needs an identifier or a title and an author"));
		}

		Ok(criteria)
	}

	fn title_author(&self) -> Option<(&str, &str)> {
		Some((present(&self.title)?, present(&self.author)?))
	}
}

fn present(value: &Option<String>) -> Option<&str> {
	value.as_deref().filter(|value| !value.trim().is_empty())
}

struct BookStrategy<'a, C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	user: &'a User<C, M>,
	query: &'a BookQuery,
}
impl<'a, C, M> ResolveStrategy for BookStrategy<'a, C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	type Criterion = BookCriterion<'a>;
	type Resource = Book;

	fn criteria(&self) -> Result<Vec<BookCriterion<'a>>> {
		self.query.criteria()
	}

	fn find<'b>(&'b self, criterion: &'b BookCriterion<'a>) -> ResolveFuture<'b, Option<Book>> {
		Box::pin(self.user.api.match_book(&self.user.credential().access_token, *criterion))
	}

	fn create(&self) -> ResolveFuture<'_, Book> {
		Box::pin(async move {
			let (title, author) = self.query.title_author().ok_or_else(|| {
				Error::validation("creating a book requires a title and an author")
			})?;
			let draft = NewBook { title, author, identifier: present(&self.query.identifier) };

			self.user.api.create_book(&self.user.credential().access_token, &draft).await
		})
	}
}

impl<C, M> User<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Looks a book up by identifier, then by title and author.
	pub async fn find_book(&self, query: &BookQuery) -> Result<Resolution<Book>> {
		self.resolve_book(query, ResolveMode::FindOnly, "find_book").await
	}

	/// Looks a book up by title and author.
	pub async fn find_book_by_title(&self, title: &str, author: &str) -> Result<Resolution<Book>> {
		self.find_book(&BookQuery::by_title(title, author)).await
	}

	/// Looks a book up and creates it with the query's fields when nothing matches.
	///
	/// Creation needs a title and an author; a query holding only an identifier fails with
	/// [`Error::Validation`] once its lookup has missed.
	pub async fn find_or_create_book(&self, query: &BookQuery) -> Result<Resolution<Book>> {
		self.resolve_book(query, ResolveMode::FindOrCreate, "find_or_create_book").await
	}

	/// Callback form of [`Self::find_book`].
	pub fn find_book_with(
		&self,
		query: BookQuery,
		target: Arc<dyn Completion<BookOutcome>>,
	) -> impl Future<Output = ()> + Send + '_ {
		let pending = self.api.dispatcher.register(FlowKind::Book, target);

		async move {
			let result = self.find_book(&query).await;

			pending.dispatch(result.into());
		}
	}

	/// Callback form of [`Self::find_or_create_book`].
	pub fn find_or_create_book_with(
		&self,
		query: BookQuery,
		target: Arc<dyn Completion<BookOutcome>>,
	) -> impl Future<Output = ()> + Send + '_ {
		let pending = self.api.dispatcher.register(FlowKind::Book, target);

		async move {
			let result = self.find_or_create_book(&query).await;

			pending.dispatch(result.into());
		}
	}

	async fn resolve_book(
		&self,
		query: &BookQuery,
		mode: ResolveMode,
		stage: &'static str,
	) -> Result<Resolution<Book>> {
		observed(FlowKind::Book, stage, Resolution::flow_outcome, async move {
			self.session.ensure_live()?;

			resolve(&BookStrategy { user: self, query }, mode).await
		})
		.await
	}
}

impl From<Result<Resolution<Book>>> for BookOutcome {
	fn from(result: Result<Resolution<Book>>) -> Self {
		match result {
			Ok(Resolution::Found(book)) => Self::Found { book, created: false },
			Ok(Resolution::Created(book)) => Self::Found { book, created: true },
			Ok(Resolution::NotFound) => Self::NotFound,
			Err(e) => Self::Failed(e),
		}
	}
}
