// self
use crate::{_prelude::*, obs::OpKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// Span for one client operation.
///
/// Carries `op` and `stage` from creation and an initially empty `status` field that is
/// filled once the operation has an HTTP response.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a span for `kind` at call site `stage`.
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"bearer_session.op",
				op = kind.as_str(),
				stage,
				status = tracing::field::Empty
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Records the HTTP status the operation ended with.
	pub fn record_status(&self, status: StatusCode) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("status", status.as_u16());
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = status;
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
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

/// Emits a debug-level event inside the current span when tracing is enabled.
pub fn note(message: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!("{message}");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = message;
	}
}

/// Like [`note`], with a `count` field (e.g. followers settled by an episode).
pub fn note_count(message: &'static str, count: usize) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(count, "{message}");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (message, count);
	}
}

/// Emits a warn-level event carrying `error` inside the current span when tracing is enabled.
pub fn warn_with_error(message: &'static str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(error = %error, "{message}");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (message, error);
	}
}
