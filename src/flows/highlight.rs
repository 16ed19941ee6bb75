//! Highlight range queries.

// self
use crate::{
	_prelude::*,
	dispatch::{Completion, HighlightOutcome},
	flows::observed,
	http::ApiHttpClient,
	model::{Highlights, User},
	oauth::TransportErrorMapper,
	obs::{FlowKind, FlowOutcome},
};

impl<C, M> User<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Up to `count` of the user's highlights made in `[from, to)`, most recent first.
	///
	/// An empty range or a zero `count` returns an empty sequence without a request. No
	/// matches is an empty sequence too, never an error.
	pub async fn find_highlights(
		&self,
		count: usize,
		from: OffsetDateTime,
		to: OffsetDateTime,
	) -> Result<Highlights> {
		observed(FlowKind::Highlight, "find_highlights", classify, async move {
			self.session.ensure_live()?;

			if count == 0 || from >= to {
				return Ok(Highlights::empty());
			}

			let items =
				self.api.highlights(&self.credential().access_token, count, from, to).await?;

			Ok(Highlights::bounded(items, count, from, to))
		})
		.await
	}

	/// Callback form of [`Self::find_highlights`].
	pub fn find_highlights_with(
		&self,
		count: usize,
		from: OffsetDateTime,
		to: OffsetDateTime,
		target: Arc<dyn Completion<HighlightOutcome>>,
	) -> impl Future<Output = ()> + Send + '_ {
		let pending = self.api.dispatcher.register(FlowKind::Highlight, target);

		async move {
			let outcome = match self.find_highlights(count, from, to).await {
				Ok(highlights) => HighlightOutcome::Found { highlights, from, to },
				Err(error) => HighlightOutcome::Failed { from, to, error },
			};

			pending.dispatch(outcome);
		}
	}
}

fn classify(highlights: &Highlights) -> FlowOutcome {
	if highlights.is_empty() { FlowOutcome::NotFound } else { FlowOutcome::Success }
}
