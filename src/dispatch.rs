//! Exactly-once delivery of asynchronous outcomes to host completion targets.
//!
//! Callback-style entry points register a [`PendingRequest`] synchronously, then hand the host a
//! future to spawn. When the future finishes it consumes the request and delivers one terminal
//! outcome; dropping the future unpolled deregisters the request without delivering anything.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	http::ApiHttpClient,
	model::{Book, Highlights, Reading, User},
	oauth::TransportErrorMapper,
	obs::{self, FlowKind},
};

/// Host-side receiver of an outcome.
///
/// Closures of the form `Fn(O) + Send + Sync` implement this automatically.
pub trait Completion<O>
where
	Self: Send + Sync,
{
	/// Receives the single terminal outcome of a request.
	fn complete(&self, outcome: O);
}
impl<O, F> Completion<O> for F
where
	F: Fn(O) + Send + Sync,
{
	fn complete(&self, outcome: O) {
		self(outcome)
	}
}

/// Terminal outcome with a stable label for logs.
pub trait Outcome {
	/// Label recorded when the outcome is dispatched.
	fn label(&self) -> &'static str;
}

/// Outcome of an authorization-code exchange or a credential verification.
pub enum AuthenticationOutcome<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// The service accepted the credential; persist the user's credential record now.
	Authenticated(User<C, M>),
	/// The exchange or verification failed.
	Failed(Error),
}
impl<C, M> Outcome for AuthenticationOutcome<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn label(&self) -> &'static str {
		match self {
			Self::Authenticated(_) => "authenticated",
			Self::Failed(_) => "failed",
		}
	}
}
impl<C, M> From<Result<User<C, M>>> for AuthenticationOutcome<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn from(result: Result<User<C, M>>) -> Self {
		match result {
			Ok(user) => Self::Authenticated(user),
			Err(e) => Self::Failed(e),
		}
	}
}
impl<C, M> Debug for AuthenticationOutcome<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Authenticated(user) => f.debug_tuple("Authenticated").field(user).finish(),
			Self::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
		}
	}
}

/// Outcome of a book lookup or find-or-create.
#[derive(Debug)]
pub enum BookOutcome {
	/// A book was matched, or created when `created` is set.
	Found {
		/// The resolved book.
		book: Book,
		/// Whether the service created the book for this request.
		created: bool,
	},
	/// Nothing matched and creation was not requested.
	NotFound,
	/// The request failed.
	Failed(Error),
}
impl Outcome for BookOutcome {
	fn label(&self) -> &'static str {
		match self {
			Self::Found { created: false, .. } => "found",
			Self::Found { created: true, .. } => "created",
			Self::NotFound => "not_found",
			Self::Failed(_) => "failed",
		}
	}
}

/// Outcome of a reading lookup or find-or-create.
#[derive(Debug)]
pub enum ReadingOutcome {
	/// The user's reading for `book`, created when `created` is set.
	Found {
		/// The resolved reading.
		reading: Reading,
		/// Book the request was issued for.
		book: Book,
		/// Whether the service created the reading for this request.
		created: bool,
	},
	/// The user has no reading for `book`.
	NotFound {
		/// Book the request was issued for.
		book: Book,
	},
	/// The request failed.
	Failed {
		/// Book the request was issued for.
		book: Book,
		/// Failure cause.
		error: Error,
	},
}
impl Outcome for ReadingOutcome {
	fn label(&self) -> &'static str {
		match self {
			Self::Found { created: false, .. } => "found",
			Self::Found { created: true, .. } => "created",
			Self::NotFound { .. } => "not_found",
			Self::Failed { .. } => "failed",
		}
	}
}

/// Outcome of a highlight range query.
#[derive(Debug)]
pub enum HighlightOutcome {
	/// Highlights in the requested range; possibly empty.
	Found {
		/// Matching highlights, most recent first.
		highlights: Highlights,
		/// Inclusive lower bound of the query.
		from: OffsetDateTime,
		/// Exclusive upper bound of the query.
		to: OffsetDateTime,
	},
	/// The request failed.
	Failed {
		/// Inclusive lower bound of the query.
		from: OffsetDateTime,
		/// Exclusive upper bound of the query.
		to: OffsetDateTime,
		/// Failure cause.
		error: Error,
	},
}
impl Outcome for HighlightOutcome {
	fn label(&self) -> &'static str {
		match self {
			Self::Found { .. } => "found",
			Self::Failed { .. } => "failed",
		}
	}
}

/// Correlation id of an in-flight request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(u64);
impl RequestId {
	/// Raw value.
	pub const fn get(self) -> u64 {
		self.0
	}
}

/// Registry of in-flight requests shared by every flow of an [`Api`](crate::api::Api).
#[derive(Clone, Debug, Default)]
pub struct CallbackDispatcher(Arc<Registry>);
impl CallbackDispatcher {
	/// Registers a request whose outcome goes to `target`.
	pub fn register<O>(&self, kind: FlowKind, target: Arc<dyn Completion<O>>) -> PendingRequest<O>
	where
		O: Outcome,
	{
		let id = RequestId(self.0.next_id.fetch_add(1, Ordering::Relaxed) + 1);

		self.0.pending.lock().insert(id, kind);

		PendingRequest { id, kind, target, dispatcher: self.clone() }
	}

	/// Number of requests still waiting for their outcome.
	pub fn in_flight(&self) -> usize {
		self.0.pending.lock().len()
	}

	/// Whether `id` is still waiting for its outcome.
	pub fn is_pending(&self, id: RequestId) -> bool {
		self.0.pending.lock().contains_key(&id)
	}

	fn forget(&self, id: RequestId) -> bool {
		self.0.pending.lock().remove(&id).is_some()
	}
}

#[derive(Debug, Default)]
struct Registry {
	next_id: AtomicU64,
	pending: Mutex<HashMap<RequestId, FlowKind>>,
}

/// One in-flight request and the target that receives its outcome.
pub struct PendingRequest<O>
where
	O: Outcome,
{
	id: RequestId,
	kind: FlowKind,
	target: Arc<dyn Completion<O>>,
	dispatcher: CallbackDispatcher,
}
impl<O> PendingRequest<O>
where
	O: Outcome,
{
	/// Correlation id.
	pub fn id(&self) -> RequestId {
		self.id
	}

	/// Deregisters the request, then hands `outcome` to the target.
	pub fn dispatch(self, outcome: O) {
		if self.dispatcher.forget(self.id) {
			obs::record_dispatch(self.kind, self.id.get(), outcome.label());
			self.target.complete(outcome);
		}
	}
}
impl<O> Drop for PendingRequest<O>
where
	O: Outcome,
{
	fn drop(&mut self) {
		self.dispatcher.forget(self.id);
	}
}
impl<O> Debug for PendingRequest<O>
where
	O: Outcome,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PendingRequest").field("id", &self.id).field("kind", &self.kind).finish()
	}
}
