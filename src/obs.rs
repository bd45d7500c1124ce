//! Optional observability helpers for refresh and fetch operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `liftlog_client.op` with the `op` and `stage`
//!   fields, plus warnings for soft-failed refreshes and fetches.
//! - Enable `metrics` to increment the `liftlog_client_op_total` counter for every
//!   attempt/success/failure/fallback, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Pre-request refresh driven by the near-expiry check.
	ProactiveRefresh,
	/// Refresh triggered by a 401 response.
	ReactiveRefresh,
	/// Read-through cache fetch.
	CacheFetch,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::ProactiveRefresh => "proactive_refresh",
			OpKind::ReactiveRefresh => "reactive_refresh",
			OpKind::CacheFetch => "cache_fetch",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure recovered by falling back to stale state.
	Fallback,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Fallback => "fallback",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
