// self
use crate::obs::{OpKind, OpOutcome};

/// Name of the counter incremented by [`record_op_outcome`].
pub const OP_COUNTER: &str = "liftlog_client_op_total";

/// Bumps [`OP_COUNTER`] for `kind`/`outcome` on the installed `metrics` recorder.
///
/// Compiles to nothing without the `metrics` feature.
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(OP_COUNTER, "op" => kind.as_str(), "outcome" => outcome.as_str()).increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}
