// self
use crate::{_prelude::*, auth::AuthState, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by SDK flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("reading_sdk.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a `debug` event for a session state change.
pub fn record_transition(from: AuthState, to: AuthState) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(from = from.as_str(), to = to.as_str(), "session state changed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (from, to);
	}
}

/// Emits a `debug` event when an outcome is handed to a completion target.
pub fn record_dispatch(kind: FlowKind, request: u64, outcome: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(flow = kind.as_str(), request, outcome, "outcome dispatched");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, request, outcome);
	}
}
