//! Client configuration: API base URL, endpoint paths, refresh window, and timeouts.

// self
use crate::{_prelude::*, auth::NEAR_EXPIRY_WINDOW, error::ConfigError};

/// Default refresh endpoint path.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
/// Default rest-timer endpoint path.
pub const DEFAULT_REST_TIMERS_PATH: &str = "/rest-timers";

/// Validated client configuration. Build one through [`ClientConfig::builder`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// API base URL every request path is appended to.
	pub base_url: Url,
	/// Token refresh endpoint.
	pub refresh_url: Url,
	/// Rest-timer list endpoint.
	pub rest_timers_url: Url,
	/// Remaining-lifetime cutoff below which tokens are refreshed before use.
	pub near_expiry_window: Duration,
	/// Upper bound on a single refresh call.
	pub refresh_timeout: Duration,
	/// Freshness window for cached reference lists.
	pub cache_ttl: Duration,
	/// Upper bound on a single cache fetch.
	pub fetch_timeout: Duration,
}
impl ClientConfig {
	/// Default bound on refresh calls.
	pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::seconds(15);
	/// Default cache freshness window.
	pub const DEFAULT_CACHE_TTL: Duration = Duration::minutes(5);
	/// Default bound on cache fetches.
	pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::seconds(15);

	/// Starts a builder for the API rooted at `base_url`.
	pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url.into())
	}

	/// Resolves an API path (optionally carrying a query string) against the base URL.
	pub fn url_for(&self, path: &str) -> Result<Url, ConfigError> {
		join_path(&self.base_url, "request", path)
	}
}

/// Builder for [`ClientConfig`].
#[derive(Clone, Debug)]
pub struct ClientConfigBuilder {
	base_url: String,
	refresh_path: String,
	rest_timers_path: String,
	near_expiry_window: Duration,
	refresh_timeout: Duration,
	cache_ttl: Duration,
	fetch_timeout: Duration,
}
impl ClientConfigBuilder {
	fn new(base_url: String) -> Self {
		Self {
			base_url,
			refresh_path: DEFAULT_REFRESH_PATH.into(),
			rest_timers_path: DEFAULT_REST_TIMERS_PATH.into(),
			near_expiry_window: NEAR_EXPIRY_WINDOW,
			refresh_timeout: ClientConfig::DEFAULT_REFRESH_TIMEOUT,
			cache_ttl: ClientConfig::DEFAULT_CACHE_TTL,
			fetch_timeout: ClientConfig::DEFAULT_FETCH_TIMEOUT,
		}
	}

	/// Overrides the refresh endpoint path (defaults to `/auth/refresh`).
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the rest-timer endpoint path (defaults to `/rest-timers`).
	pub fn rest_timers_path(mut self, path: impl Into<String>) -> Self {
		self.rest_timers_path = path.into();

		self
	}

	/// Overrides the near-expiry window (defaults to 24 hours).
	pub fn near_expiry_window(mut self, window: Duration) -> Self {
		self.near_expiry_window = window;

		self
	}

	/// Overrides the refresh timeout (defaults to 15 seconds).
	pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
		self.refresh_timeout = timeout;

		self
	}

	/// Overrides the cache freshness window (defaults to 5 minutes).
	pub fn cache_ttl(mut self, ttl: Duration) -> Self {
		self.cache_ttl = ttl;

		self
	}

	/// Overrides the cache fetch timeout (defaults to 15 seconds).
	pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
		self.fetch_timeout = timeout;

		self
	}

	/// Validates the settings and produces a [`ClientConfig`].
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let base_url = Url::parse(&self.base_url)
			.map_err(|source| ConfigError::InvalidBaseUrl { source })?;

		if !matches!(base_url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { scheme: base_url.scheme().into() });
		}

		for (field, value) in [
			("near_expiry_window", self.near_expiry_window),
			("refresh_timeout", self.refresh_timeout),
			("cache_ttl", self.cache_ttl),
			("fetch_timeout", self.fetch_timeout),
		] {
			if !value.is_positive() {
				return Err(ConfigError::NonPositiveDuration { field });
			}
		}

		let refresh_url = join_path(&base_url, "refresh", &self.refresh_path)?;
		let rest_timers_url = join_path(&base_url, "rest_timers", &self.rest_timers_path)?;

		Ok(ClientConfig {
			base_url,
			refresh_url,
			rest_timers_url,
			near_expiry_window: self.near_expiry_window,
			refresh_timeout: self.refresh_timeout,
			cache_ttl: self.cache_ttl,
			fetch_timeout: self.fetch_timeout,
		})
	}
}

// `Url::join` would drop a base path such as `/api`, so paths are appended instead.
fn join_path(base: &Url, field: &'static str, path: &str) -> Result<Url, ConfigError> {
	if !path.starts_with('/') {
		return Err(ConfigError::InvalidPath { field, path: path.into() });
	}

	let joined = format!("{}{path}", base.as_str().trim_end_matches('/'));

	Url::parse(&joined).map_err(|source| ConfigError::InvalidEndpoint { field, source })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_match_documented_values() {
		let config = ClientConfig::builder("https://api.liftlog.test/api")
			.build()
			.expect("Default configuration should build.");

		assert_eq!(config.refresh_url.as_str(), "https://api.liftlog.test/api/auth/refresh");
		assert_eq!(config.rest_timers_url.as_str(), "https://api.liftlog.test/api/rest-timers");
		assert_eq!(config.near_expiry_window, Duration::hours(24));
		assert_eq!(config.cache_ttl, Duration::minutes(5));
	}

	#[test]
	fn url_for_keeps_base_path_and_query() {
		let config = ClientConfig::builder("http://localhost:3000/api/")
			.build()
			.expect("Trailing slash base URL should build.");
		let url = config.url_for("/workouts?limit=5").expect("Path should resolve.");

		assert_eq!(url.as_str(), "http://localhost:3000/api/workouts?limit=5");
		assert!(matches!(
			config.url_for("workouts"),
			Err(ConfigError::InvalidPath { field: "request", .. })
		));
	}

	#[test]
	fn invalid_settings_are_rejected() {
		assert!(matches!(
			ClientConfig::builder("ftp://files.example.com").build(),
			Err(ConfigError::UnsupportedScheme { .. })
		));
		assert!(matches!(
			ClientConfig::builder("not a url").build(),
			Err(ConfigError::InvalidBaseUrl { .. })
		));
		assert!(matches!(
			ClientConfig::builder("https://api.liftlog.test").cache_ttl(Duration::ZERO).build(),
			Err(ConfigError::NonPositiveDuration { field: "cache_ttl" })
		));
		assert!(matches!(
			ClientConfig::builder("https://api.liftlog.test").refresh_path("auth/refresh").build(),
			Err(ConfigError::InvalidPath { field: "refresh", .. })
		));
	}
}
