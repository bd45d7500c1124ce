// self
use crate::{_prelude::*, obs::OpKind};

/// Future returned by [`OpSpan::instrument`]; the bare future when `tracing` is off.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`OpSpan::instrument`]; the bare future when `tracing` is off.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// `liftlog_client.op` span wrapped around one refresh or cache fetch.
///
/// `stage` names the entry point that started the operation, e.g. `"ensure_fresh_token"` or
/// `"recover_unauthorized"`.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Opens the span for `kind` started from `stage`.
	#[cfg(feature = "tracing")]
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		Self { span: tracing::info_span!("liftlog_client.op", op = kind.as_str(), stage) }
	}

	/// Opens the span for `kind` started from `stage`.
	#[cfg(not(feature = "tracing"))]
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		let _ = (kind, stage);

		Self {}
	}

	/// Runs `fut` inside the span; the refresh and fetch futures cross `.await` points, so no
	/// guard is entered.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			tracing::Instrument::instrument(fut, self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a failure that is absorbed instead of returned to the caller.
pub fn warn_soft_fail(kind: OpKind, err: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(op = kind.as_str(), error = %err, "operation failed; continuing without it");
	#[cfg(not(feature = "tracing"))]
	let _ = (kind, err);
}
