//! Rest-timer presets: the API model, the cache fetcher, and a facade that keeps the cache
//! coherent with mutations.

// crates.io
use reqwest::Method;
// self
use crate::{
	_prelude::*,
	cache::{CacheEvent, FetchFuture, Fetcher, TimerCache},
	error::ConfigError,
	http,
	interceptor::SessionClient,
	notify::Subscription,
};

/// Rest-timer preset owned by the signed-in user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestTimer {
	/// Server-assigned identifier.
	pub id: String,
	/// Display name, e.g. `"Heavy sets"`.
	pub name: String,
	/// Countdown length in seconds.
	pub seconds: u32,
}

/// Payload for creating a rest-timer preset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRestTimer {
	/// Display name.
	pub name: String,
	/// Countdown length in seconds.
	pub seconds: u32,
}
impl NewRestTimer {
	/// Creates a payload.
	pub fn new(name: impl Into<String>, seconds: u32) -> Self {
		Self { name: name.into(), seconds }
	}
}

/// [`Fetcher`] loading the rest-timer list through the authenticated pipeline.
#[derive(Debug)]
pub struct RestTimerFetcher {
	client: Arc<SessionClient>,
}
impl RestTimerFetcher {
	/// Creates a fetcher for the configured rest-timer endpoint.
	pub fn new(client: Arc<SessionClient>) -> Self {
		Self { client }
	}
}
impl Fetcher<Vec<RestTimer>> for RestTimerFetcher {
	fn fetch(&self) -> FetchFuture<'_, Vec<RestTimer>> {
		Box::pin(async move {
			let url = self.client.config().rest_timers_url.clone();
			let request =
				self.client.request_url(Method::GET, url).build().map_err(http::transport_error)?;

			http::decode_json(self.client.execute(request).await?).await
		})
	}
}

/// Rest-timer API with a shared read-through cache.
///
/// Creating or deleting a preset invalidates the cache, so every observer re-reads the list.
#[derive(Debug)]
pub struct RestTimers {
	client: Arc<SessionClient>,
	cache: TimerCache<Vec<RestTimer>>,
}
impl RestTimers {
	/// Creates the facade; freshness and fetch bounds come from the client's configuration.
	pub fn new(client: Arc<SessionClient>) -> Self {
		let fetcher = Arc::new(RestTimerFetcher::new(client.clone()));
		let cache = TimerCache::<Vec<RestTimer>>::from_config(fetcher, client.config());

		Self { client, cache }
	}

	/// Underlying cache.
	pub fn cache(&self) -> &TimerCache<Vec<RestTimer>> {
		&self.cache
	}

	/// Returns the rest-timer list, served from cache while fresh.
	pub async fn list(&self, force_refresh: bool) -> Result<Vec<RestTimer>> {
		self.cache.get(force_refresh).await
	}

	/// Creates a preset and invalidates the cached list.
	pub async fn create(&self, timer: &NewRestTimer) -> Result<RestTimer> {
		let url = self.client.config().rest_timers_url.clone();
		let request = self
			.client
			.request_url(Method::POST, url)
			.json(timer)
			.build()
			.map_err(http::transport_error)?;
		let created = http::decode_json(self.client.execute(request).await?).await?;

		self.cache.invalidate();

		Ok(created)
	}

	/// Deletes a preset and invalidates the cached list.
	pub async fn delete(&self, id: &str) -> Result<()> {
		let mut url = self.client.config().rest_timers_url.clone();

		url.path_segments_mut()
			.map_err(|_| ConfigError::InvalidPath {
				field: "rest_timers",
				path: self.client.config().rest_timers_url.to_string(),
			})?
			.pop_if_empty()
			.push(id);

		let request =
			self.client.request_url(Method::DELETE, url).build().map_err(http::transport_error)?;

		self.client.execute(request).await?;
		self.cache.invalidate();

		Ok(())
	}

	/// Registers an observer for cache updates and invalidations.
	pub fn subscribe<F>(&self, handler: F) -> Subscription
	where
		F: 'static + Fn(&CacheEvent) + Send + Sync,
	{
		self.cache.subscribe(handler)
	}
}
