//! Generic find-or-create protocol shared by the resource flows.
//!
//! A [`ResolveStrategy`] supplies ordered lookup criteria (strongest first), a matcher, and a
//! creator. [`resolve`] tries each criterion in turn, stops at the first match, and creates the
//! resource only in [`ResolveMode::FindOrCreate`] once every lookup has missed. Nothing
//! coalesces concurrent resolutions: two callers racing on the same criteria can both create.

// self
use crate::{_prelude::*, obs::FlowOutcome};

/// Boxed future returned by [`ResolveStrategy`] lookups and creators.
pub type ResolveFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Whether a resolution may create the resource when no lookup matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolveMode {
	/// Report [`Resolution::NotFound`] when nothing matches.
	FindOnly,
	/// Create the resource when nothing matches.
	FindOrCreate,
}

/// Terminal result of a resolution. A miss is a value, not an error.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution<T> {
	/// An existing resource matched one of the criteria.
	Found(T),
	/// No criterion matched and the resource was created.
	Created(T),
	/// No criterion matched and creation was not requested.
	NotFound,
}
impl<T> Resolution<T> {
	/// Returns the resolved resource, if any.
	pub fn into_inner(self) -> Option<T> {
		match self {
			Self::Found(value) | Self::Created(value) => Some(value),
			Self::NotFound => None,
		}
	}

	/// Borrows the resolved resource, if any.
	pub fn as_inner(&self) -> Option<&T> {
		match self {
			Self::Found(value) | Self::Created(value) => Some(value),
			Self::NotFound => None,
		}
	}

	/// Returns `true` when the resource was created by this resolution.
	pub fn was_created(&self) -> bool {
		matches!(self, Self::Created(_))
	}

	pub(crate) fn flow_outcome(&self) -> FlowOutcome {
		match self {
			Self::NotFound => FlowOutcome::NotFound,
			_ => FlowOutcome::Success,
		}
	}
}

/// Resource-specific half of the find-or-create protocol.
pub trait ResolveStrategy
where
	Self: Send + Sync,
{
	/// One lookup key, e.g. an identifier or a title/author pair.
	type Criterion: Send + Sync;
	/// Resource being resolved.
	type Resource: Send;

	/// Usable criteria in precedence order.
	///
	/// Fails with [`Error::Validation`] when the caller supplied nothing to look up; this runs
	/// before any request is issued.
	fn criteria(&self) -> Result<Vec<Self::Criterion>>;

	/// Looks the resource up by one criterion; `None` when the service has no match.
	fn find<'a>(&'a self, criterion: &'a Self::Criterion)
	-> ResolveFuture<'a, Option<Self::Resource>>;

	/// Creates the resource after every lookup missed.
	fn create(&self) -> ResolveFuture<'_, Self::Resource>;
}

/// Runs the find-or-create protocol for `strategy`.
pub async fn resolve<S>(strategy: &S, mode: ResolveMode) -> Result<Resolution<S::Resource>>
where
	S: ?Sized + ResolveStrategy,
{
	let criteria = strategy.criteria()?;

	for criterion in &criteria {
		if let Some(found) = strategy.find(criterion).await? {
			return Ok(Resolution::Found(found));
		}
	}

	match mode {
		ResolveMode::FindOnly => Ok(Resolution::NotFound),
		ResolveMode::FindOrCreate => strategy.create().await.map(Resolution::Created),
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	/// Resolves numbers against an in-memory catalog.
	#[derive(Default)]
	struct CatalogStrategy {
		keys: Vec<u32>,
		catalog: Vec<u32>,
		lookups: AtomicUsize,
		creations: AtomicUsize,
	}
	impl ResolveStrategy for CatalogStrategy {
		type Criterion = u32;
		type Resource = u32;

		fn criteria(&self) -> Result<Vec<u32>> {
			if self.keys.is_empty() {
				return Err(Error::validation("no keys supplied"));
			}

			Ok(self.keys.clone())
		}

		fn find<'a>(&'a self, criterion: &'a u32) -> ResolveFuture<'a, Option<u32>> {
			Box::pin(async move {
				self.lookups.fetch_add(1, Ordering::SeqCst);

				Ok(self.catalog.iter().copied().find(|entry| entry == criterion))
			})
		}

		fn create(&self) -> ResolveFuture<'_, u32> {
			Box::pin(async move {
				self.creations.fetch_add(1, Ordering::SeqCst);

				Ok(999)
			})
		}
	}

	#[tokio::test]
	async fn first_matching_criterion_wins() {
		let strategy =
			CatalogStrategy { keys: vec![1, 2, 3], catalog: vec![2, 3], ..Default::default() };
		let resolution = resolve(&strategy, ResolveMode::FindOrCreate)
			.await
			.expect("Resolution should succeed.");

		assert_eq!(resolution, Resolution::Found(2));
		assert_eq!(strategy.lookups.load(Ordering::SeqCst), 2);
		assert_eq!(strategy.creations.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn misses_create_only_when_asked() {
		let strategy = CatalogStrategy { keys: vec![7], ..Default::default() };

		assert_eq!(
			resolve(&strategy, ResolveMode::FindOnly).await.expect("Lookup should succeed."),
			Resolution::NotFound
		);

		let created = resolve(&strategy, ResolveMode::FindOrCreate)
			.await
			.expect("Creation should succeed.");

		assert!(created.was_created());
		assert_eq!(created.into_inner(), Some(999));
	}

	#[tokio::test]
	async fn validation_runs_before_any_lookup() {
		let strategy = CatalogStrategy::default();
		let err = resolve(&strategy, ResolveMode::FindOrCreate)
			.await
			.expect_err("Empty criteria must be rejected.");

		assert!(matches!(err, Error::Validation { .. }));
		assert_eq!(strategy.lookups.load(Ordering::SeqCst), 0);
	}
}
