//! Optional observability helpers for SDK flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `reading_sdk.flow` with the `flow` and
//!   `stage` fields, plus `debug` events for every session state change.
//! - Enable `metrics` to increment the `reading_sdk_flow_total` counter for every
//!   attempt/success/not-found/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the SDK.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization-code exchange.
	Authorization,
	/// Credential verification and rotation.
	Verification,
	/// Book find / find-or-create.
	Book,
	/// Reading find / find-or-create.
	Reading,
	/// Highlight range query.
	Highlight,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Authorization => "authorization",
			FlowKind::Verification => "verification",
			FlowKind::Book => "book",
			FlowKind::Reading => "reading",
			FlowKind::Highlight => "highlight",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to an SDK flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Lookup completed without a match.
	NotFound,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::NotFound => "not_found",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
