//! Single-flight proactive refresh gate with a FIFO waiter queue.
//!
//! Before each outbound request the interceptor calls [`RefreshGate::ensure_fresh_token`]. When
//! the stored token is inside the near-expiry window (or its expiry cannot be decoded), the first
//! caller becomes the leader and runs the [`Refresher`]; every caller arriving while that refresh
//! is in flight queues a waiter and suspends. Once the refresh settles, the token store is updated
//! first, then `refreshing` is cleared and the queue is drained in arrival order with the same
//! outcome for everyone.
//!
//! Refresh failures never escape the gate: callers fall back to the stale token and only a real
//! 401 from the server ends the session (see [`crate::interceptor`]).

// std
use std::mem;
// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, NEAR_EXPIRY_WINDOW},
	config::ClientConfig,
	obs::{self, OpKind, OpOutcome, OpSpan},
	refresh::{self, RefreshMetrics, Refresher},
	store::TokenStore,
};

/// How the gate settled for one caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateOutcome {
	/// No token is stored; the request proceeds without credentials.
	Unauthenticated,
	/// The stored token is outside the near-expiry window.
	Fresh,
	/// A refresh completed and the store holds the new token.
	Refreshed,
	/// A refresh failed, timed out, or was abandoned; the stale token is used.
	Stale,
}

/// Token to attach to the outgoing request plus the outcome that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatePass {
	/// Token read from the store after the gate settled.
	pub token: Option<AccessToken>,
	/// How the gate settled.
	pub outcome: GateOutcome,
}

#[derive(Debug, Default)]
struct GateState {
	refreshing: bool,
	waiters: VecDeque<oneshot::Sender<GateOutcome>>,
}

enum Claim {
	Lead,
	Wait(oneshot::Receiver<GateOutcome>),
	Settled(GatePass),
}

/// Coordination point guaranteeing at most one proactive refresh in flight.
pub struct RefreshGate {
	store: Arc<TokenStore>,
	refresher: Arc<dyn Refresher>,
	window: Duration,
	refresh_timeout: Duration,
	state: Mutex<GateState>,
	metrics: RefreshMetrics,
}
impl RefreshGate {
	/// Creates a gate with the default 24 hour window and 15 second refresh timeout.
	pub fn new(store: Arc<TokenStore>, refresher: Arc<dyn Refresher>) -> Self {
		Self {
			store,
			refresher,
			window: NEAR_EXPIRY_WINDOW,
			refresh_timeout: ClientConfig::DEFAULT_REFRESH_TIMEOUT,
			state: Mutex::new(GateState::default()),
			metrics: RefreshMetrics::default(),
		}
	}

	/// Creates a gate using the window and timeout from `config`.
	pub fn from_config(
		store: Arc<TokenStore>,
		refresher: Arc<dyn Refresher>,
		config: &ClientConfig,
	) -> Self {
		Self::new(store, refresher)
			.with_window(config.near_expiry_window)
			.with_refresh_timeout(config.refresh_timeout)
	}

	/// Overrides the near-expiry window.
	pub fn with_window(mut self, window: Duration) -> Self {
		self.window = window;

		self
	}

	/// Overrides the bound on each refresh call.
	pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
		self.refresh_timeout = timeout;

		self
	}

	/// Token store the gate reads from and writes refreshed sessions to.
	pub fn store(&self) -> &Arc<TokenStore> {
		&self.store
	}

	/// Counters for refresh calls issued by this gate.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns `true` while a refresh is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.state.lock().refreshing
	}

	/// Returns how many callers are suspended behind the in-flight refresh.
	pub fn pending_waiters(&self) -> usize {
		self.state.lock().waiters.len()
	}

	/// Makes sure the stored token is usable, refreshing it at most once across concurrent
	/// callers, and returns the token to attach.
	///
	/// Never fails: a failed refresh yields [`GateOutcome::Stale`] with the previous token.
	pub async fn ensure_fresh_token(&self) -> GatePass {
		let Some(token) = self.store.token() else {
			return GatePass { token: None, outcome: GateOutcome::Unauthenticated };
		};

		if !token.is_near_expiry(self.window) {
			return GatePass { token: Some(token), outcome: GateOutcome::Fresh };
		}

		let outcome = match self.claim() {
			Claim::Lead => self.lead_refresh().await,
			// A dropped sender means the leader vanished without settling.
			Claim::Wait(rx) => rx.await.unwrap_or(GateOutcome::Stale),
			Claim::Settled(pass) => return pass,
		};

		GatePass { token: self.store.token(), outcome }
	}

	// Check-and-set of `refreshing` and the enqueue happen under one lock.
	fn claim(&self) -> Claim {
		let mut state = self.state.lock();

		if state.refreshing {
			let (tx, rx) = oneshot::channel();

			state.waiters.push_back(tx);

			return Claim::Wait(rx);
		}

		// A leader may have settled between the unlocked check and this lock.
		if let Some(token) = self.store.token()
			&& !token.is_near_expiry(self.window)
		{
			return Claim::Settled(GatePass { token: Some(token), outcome: GateOutcome::Fresh });
		}

		state.refreshing = true;

		Claim::Lead
	}

	async fn lead_refresh(&self) -> GateOutcome {
		const KIND: OpKind = OpKind::ProactiveRefresh;

		// Settles with `Stale` if this future is dropped before the refresh completes.
		let mut settle = Settle { gate: self, outcome: GateOutcome::Stale };
		let span = OpSpan::new(KIND, "ensure_fresh_token");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span
			.instrument(refresh::refresh_within(self.refresher.as_ref(), KIND, self.refresh_timeout))
			.await;
		let outcome = match result {
			Ok(session) => {
				if let Err(err) = self.store.set(session) {
					obs::warn_soft_fail(KIND, &Error::from(err));
				}

				self.metrics.record_success();
				obs::record_op_outcome(KIND, OpOutcome::Success);

				GateOutcome::Refreshed
			},
			Err(err) => {
				obs::warn_soft_fail(KIND, &err);
				self.metrics.record_failure(&err);
				obs::record_op_outcome(KIND, OpOutcome::Fallback);

				GateOutcome::Stale
			},
		};

		settle.outcome = outcome;

		outcome
	}

	fn settle(&self, outcome: GateOutcome) {
		let waiters = {
			let mut state = self.state.lock();

			state.refreshing = false;

			mem::take(&mut state.waiters)
		};

		for waiter in waiters {
			// The receiver is gone when its caller was cancelled.
			let _ = waiter.send(outcome);
		}
	}
}
impl Debug for RefreshGate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshGate")
			.field("window", &self.window)
			.field("refresh_timeout", &self.refresh_timeout)
			.field("refreshing", &state.refreshing)
			.field("waiters", &state.waiters.len())
			.finish()
	}
}

struct Settle<'a> {
	gate: &'a RefreshGate,
	outcome: GateOutcome,
}
impl Drop for Settle<'_> {
	fn drop(&mut self) {
		self.gate.settle(self.outcome);
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use super::*;
	use crate::{
		auth::Session,
		refresh::RefreshFuture,
		store::{KeyValueStore, MemoryStore},
	};

	#[derive(Default)]
	struct PendingRefresher(AtomicUsize);
	impl Refresher for PendingRefresher {
		fn refresh(&self) -> RefreshFuture<'_> {
			self.0.fetch_add(1, Ordering::SeqCst);

			Box::pin(std::future::pending())
		}
	}

	fn store_with(raw: &str) -> Arc<TokenStore> {
		let backend = Arc::new(MemoryStore::default());

		backend
			.set(crate::store::ACCESS_TOKEN_KEY, raw.into())
			.expect("Memory backend writes never fail.");

		Arc::new(TokenStore::restore(backend).expect("Memory backend restores never fail."))
	}

	#[tokio::test]
	async fn missing_token_skips_refresh() {
		let refresher = Arc::new(PendingRefresher::default());
		let store = Arc::new(TokenStore::new(Arc::new(MemoryStore::default())));
		let gate = RefreshGate::new(store, refresher.clone());
		let pass = gate.ensure_fresh_token().await;

		assert_eq!(pass, GatePass { token: None, outcome: GateOutcome::Unauthenticated });
		assert_eq!(refresher.0.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn cancelled_leader_releases_waiters() {
		let refresher = Arc::new(PendingRefresher::default());
		let gate = Arc::new(RefreshGate::new(store_with("opaque"), refresher.clone()));
		let leader = tokio::spawn({
			let gate = gate.clone();

			async move { gate.ensure_fresh_token().await }
		});

		while !gate.is_refreshing() {
			tokio::task::yield_now().await;
		}

		let waiter = tokio::spawn({
			let gate = gate.clone();

			async move { gate.ensure_fresh_token().await }
		});

		while gate.pending_waiters() == 0 {
			tokio::task::yield_now().await;
		}

		leader.abort();

		let pass = waiter.await.expect("Waiter task should not panic.");

		assert_eq!(pass.outcome, GateOutcome::Stale);
		assert_eq!(pass.token, Some(AccessToken::new("opaque")));
		assert!(!gate.is_refreshing());
		assert_eq!(refresher.0.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn claim_rechecks_token_under_the_lock() {
		let refresher = Arc::new(PendingRefresher::default());
		let store = store_with("opaque");
		let gate = RefreshGate::new(store.clone(), refresher.clone());
		let exp = (OffsetDateTime::now_utc() + Duration::days(7)).unix_timestamp();
		let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#));
		let rotated = AccessToken::new(format!("h.{payload}.s"));

		// Another leader rotated the token after this caller's unlocked check saw "opaque".
		store.set(Session::new(rotated.clone())).expect("Memory backend writes never fail.");

		match gate.claim() {
			Claim::Settled(pass) => {
				assert_eq!(pass, GatePass { token: Some(rotated), outcome: GateOutcome::Fresh });
			},
			Claim::Lead => panic!("A fresh token must not start another refresh."),
			Claim::Wait(_) => panic!("No refresh is in flight."),
		}

		assert!(!gate.is_refreshing());
		assert_eq!(refresher.0.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn store_write_lands_before_outcome() {
		struct Immediate;
		impl Refresher for Immediate {
			fn refresh(&self) -> RefreshFuture<'_> {
				Box::pin(async { Ok(Session::new(AccessToken::new("rotated"))) })
			}
		}

		let gate = RefreshGate::new(store_with("opaque"), Arc::new(Immediate));
		let pass = gate.ensure_fresh_token().await;

		assert_eq!(pass.outcome, GateOutcome::Refreshed);
		assert_eq!(pass.token, Some(AccessToken::new("rotated")));
		assert_eq!(gate.metrics().successes(), 1);
	}
}
