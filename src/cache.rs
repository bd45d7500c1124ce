//! Read-through, time-boxed cache with single-flight fetches and pub/sub invalidation.
//!
//! [`TimerCache::get`] serves the cached value while it is younger than the freshness window.
//! Otherwise callers share one in-flight fetch: the first caller drives it, later callers await
//! the same cell and observe the same outcome. A settled fetch clears the in-flight handle before
//! observers are notified, so an observer that immediately re-reads starts from a clean slate.

#[cfg(feature = "reqwest")] pub mod rest_timer;

#[cfg(feature = "reqwest")] pub use rest_timer::*;

// crates.io
use async_lock::OnceCell;
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	config::ClientConfig,
	error::FetchError,
	notify::{Subscribers, Subscription},
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Boxed future returned by [`Fetcher::fetch`].
pub type FetchFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// External operation that loads the cached value (`fetchList() -> list | error`).
pub trait Fetcher<T>
where
	Self: Send + Sync,
{
	/// Loads a fresh copy of the value.
	fn fetch(&self) -> FetchFuture<'_, T>;
}

/// Notifications delivered to cache observers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheEvent {
	/// A fetch completed and the cache holds a new value.
	Updated,
	/// The cache was cleared; observers should re-read.
	Invalidated,
}

type FetchOutcome<T> = std::result::Result<T, FetchError>;

struct CacheEntry<T> {
	value: T,
	fetched_at: Instant,
}

struct InFlight<T> {
	generation: u64,
	cell: Arc<OnceCell<FetchOutcome<T>>>,
}

struct CacheState<T> {
	entry: Option<CacheEntry<T>>,
	in_flight: Option<InFlight<T>>,
	generation: u64,
}

/// Time-boxed single-flight cache for a small reference value.
pub struct TimerCache<T> {
	fetcher: Arc<dyn Fetcher<T>>,
	ttl: std::time::Duration,
	fetch_timeout: Duration,
	state: Mutex<CacheState<T>>,
	subscribers: Subscribers<CacheEvent>,
}
impl<T> TimerCache<T>
where
	T: 'static + Clone + Send + Sync,
{
	/// Creates a cache with the default 5 minute freshness window and 15 second fetch timeout.
	pub fn new(fetcher: Arc<dyn Fetcher<T>>) -> Self {
		Self {
			fetcher,
			ttl: ClientConfig::DEFAULT_CACHE_TTL.unsigned_abs(),
			fetch_timeout: ClientConfig::DEFAULT_FETCH_TIMEOUT,
			state: Mutex::new(CacheState { entry: None, in_flight: None, generation: 0 }),
			subscribers: Subscribers::new(),
		}
	}

	/// Creates a cache using the freshness window and fetch timeout from `config`.
	pub fn from_config(fetcher: Arc<dyn Fetcher<T>>, config: &ClientConfig) -> Self {
		Self::new(fetcher).with_ttl(config.cache_ttl).with_fetch_timeout(config.fetch_timeout)
	}

	/// Overrides the freshness window.
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = ttl.unsigned_abs();

		self
	}

	/// Overrides the bound on each fetch.
	pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
		self.fetch_timeout = timeout;

		self
	}

	/// Returns the cached value, fetching it when missing, stale, or when `force_refresh` is set.
	///
	/// A fetch already in flight is joined even when `force_refresh` is set. When a fetch fails
	/// and an older value is cached, that value is returned instead of the error.
	pub async fn get(&self, force_refresh: bool) -> Result<T> {
		let (generation, cell) = {
			let mut state = self.state.lock();

			if !force_refresh
				&& let Some(entry) = &state.entry
				&& entry.fetched_at.elapsed() < self.ttl
			{
				return Ok(entry.value.clone());
			}

			match &state.in_flight {
				Some(in_flight) => (in_flight.generation, in_flight.cell.clone()),
				None => {
					state.generation += 1;

					let generation = state.generation;
					let cell = Arc::new(OnceCell::new());

					state.in_flight = Some(InFlight { generation, cell: cell.clone() });

					(generation, cell)
				},
			}
		};
		let outcome = cell.get_or_init(|| self.run_fetch(generation)).await;

		outcome.clone().map_err(Error::from)
	}

	/// Returns the cached value regardless of age without fetching.
	pub fn peek(&self) -> Option<T> {
		self.state.lock().entry.as_ref().map(|entry| entry.value.clone())
	}

	/// Returns `true` while a fetch is in flight.
	pub fn is_fetching(&self) -> bool {
		self.state.lock().in_flight.is_some()
	}

	/// Drops the cached value and any in-flight handle, then notifies observers.
	///
	/// A fetch that was already running still resolves for its callers but no longer populates
	/// the cache.
	pub fn invalidate(&self) {
		{
			let mut state = self.state.lock();

			state.entry = None;
			state.in_flight = None;
			state.generation += 1;
		}

		self.subscribers.publish(&CacheEvent::Invalidated);
	}

	/// Registers an observer for [`CacheEvent`]s.
	pub fn subscribe<F>(&self, handler: F) -> Subscription
	where
		F: 'static + Fn(&CacheEvent) + Send + Sync,
	{
		self.subscribers.subscribe(handler)
	}

	async fn run_fetch(&self, generation: u64) -> FetchOutcome<T> {
		const KIND: OpKind = OpKind::CacheFetch;

		let span = OpSpan::new(KIND, "timer_cache_get");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				match tokio::time::timeout(self.fetch_timeout.unsigned_abs(), self.fetcher.fetch())
					.await
				{
					Ok(result) => result,
					Err(_) =>
						Err(Error::Timeout { operation: KIND.as_str(), after: self.fetch_timeout }),
				}
			})
			.await;
		let (outcome, event) = {
			let mut state = self.state.lock();
			let owns_slot =
				state.in_flight.as_ref().is_some_and(|in_flight| in_flight.generation == generation);

			if owns_slot {
				state.in_flight = None;
			}

			match result {
				Ok(value) => {
					obs::record_op_outcome(KIND, OpOutcome::Success);

					if owns_slot {
						state.entry =
							Some(CacheEntry { value: value.clone(), fetched_at: Instant::now() });

						(Ok(value), Some(CacheEvent::Updated))
					} else {
						(Ok(value), None)
					}
				},
				Err(err) => match &state.entry {
					Some(entry) => {
						obs::warn_soft_fail(KIND, &err);
						obs::record_op_outcome(KIND, OpOutcome::Fallback);

						(Ok(entry.value.clone()), None)
					},
					None => {
						obs::record_op_outcome(KIND, OpOutcome::Failure);

						(Err(FetchError::from(&err)), None)
					},
				},
			}
		};

		if let Some(event) = event {
			self.subscribers.publish(&event);
		}

		outcome
	}
}
impl<T> Debug for TimerCache<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("TimerCache")
			.field("ttl", &self.ttl)
			.field("fetch_timeout", &self.fetch_timeout)
			.field("cached", &state.entry.is_some())
			.field("fetching", &state.in_flight.is_some())
			.field("subscribers", &self.subscribers.len())
			.finish()
	}
}
