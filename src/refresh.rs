//! The refresh collaborator contract plus the shared timeout wrapper and counters.
//!
//! A [`Refresher`] exchanges the ambient credential (for the HTTP implementation, the session
//! cookie) for a new access token. The proactive path reaches it through
//! [`RefreshGate`](crate::gate::RefreshGate); the reactive 401 path calls it directly. Both bound
//! the call with [`refresh_within`] so a hung endpoint cannot stall callers forever.

#[cfg(feature = "reqwest")] mod http;
mod metrics;

#[cfg(feature = "reqwest")] pub use http::HttpRefresher;
pub use metrics::{RefreshCounts, RefreshMetrics};

// self
use crate::{_prelude::*, auth::Session, obs::OpKind};

/// Boxed future returned by [`Refresher::refresh`].
pub type RefreshFuture<'a> = Pin<Box<dyn Future<Output = Result<Session>> + 'a + Send>>;

/// External operation that mints a new session (`refresh() -> (token, user) | error`).
pub trait Refresher
where
	Self: Send + Sync,
{
	/// Requests a new token using whatever credential the implementation relies on.
	fn refresh(&self) -> RefreshFuture<'_>;
}

/// Runs one refresh call bounded by `limit`; elapsing the bound is a [`Error::Timeout`].
pub async fn refresh_within(
	refresher: &dyn Refresher,
	kind: OpKind,
	limit: Duration,
) -> Result<Session> {
	match tokio::time::timeout(limit.unsigned_abs(), refresher.refresh()).await {
		Ok(result) => result,
		Err(_) => Err(Error::Timeout { operation: kind.as_str(), after: limit }),
	}
}
