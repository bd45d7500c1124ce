// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Point-in-time copy of [`RefreshMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshCounts {
	/// Refresh calls issued.
	pub attempts: u64,
	/// Calls that produced a new session.
	pub successes: u64,
	/// Calls that failed, including timeouts.
	pub failures: u64,
	/// Failures caused by the refresh timeout elapsing.
	pub timeouts: u64,
}

/// Thread-safe counters for the refresh calls issued by one path (proactive gate or 401 recovery).
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
	timeouts: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the total number of refresh calls issued.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh calls that produced a new session.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh calls that failed or timed out.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh calls abandoned because the timeout elapsed.
	pub fn timeouts(&self) -> u64 {
		self.timeouts.load(Ordering::Relaxed)
	}

	/// Reads every counter at once.
	pub fn snapshot(&self) -> RefreshCounts {
		RefreshCounts {
			attempts: self.attempts(),
			successes: self.successes(),
			failures: self.failures(),
			timeouts: self.timeouts(),
		}
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.successes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self, err: &Error) {
		self.failures.fetch_add(1, Ordering::Relaxed);

		if matches!(err, Error::Timeout { .. }) {
			self.timeouts.fetch_add(1, Ordering::Relaxed);
		}
	}
}
