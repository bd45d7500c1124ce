//! Request pipeline wrapping every authenticated API call.
//!
//! Each request passes through two hooks:
//!
//! 1. Before sending, [`RefreshGate::ensure_fresh_token`] runs and the token it hands back is
//!    attached as `Authorization: Bearer <token>`.
//! 2. When the response is a 401, the request is retried once after a direct reactive refresh. If
//!    that refresh fails, the stored session is cleared, [`SessionEvent::Terminated`] is published
//!    so the host can route to sign-in, and the call fails with [`Error::SessionExpired`].
//!
//! A retried request never triggers another refresh: a second 401 is normalized like any other
//! error response.

// crates.io
use reqwest::{
	Method, Request, RequestBuilder, Response,
	header::{AUTHORIZATION, HeaderValue},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	config::ClientConfig,
	error::ApiError,
	gate::RefreshGate,
	http::{self, ApiHttpClient},
	notify::{Subscribers, Subscription},
	obs::{self, OpKind, OpOutcome, OpSpan},
	refresh::{self, HttpRefresher, RefreshMetrics, Refresher},
	store::TokenStore,
};

/// Session lifecycle notifications published by [`SessionClient`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
	/// A reactive refresh stored a new token.
	Refreshed,
	/// Recovery failed and the stored session was cleared; the user must sign in again.
	Terminated,
	/// The session was cleared through [`SessionClient::logout`].
	LoggedOut,
}

/// Where a request currently is in the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestPhase {
	/// Sent with the token handed out by the gate.
	Initial,
	/// First attempt came back 401 and reactive recovery is running.
	Recovering,
	/// Re-sent once with the recovered token.
	Retried,
}
impl RequestPhase {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestPhase::Initial => "initial",
			RequestPhase::Recovering => "recovering",
			RequestPhase::Retried => "retried",
		}
	}
}

/// Authenticated API client combining the refresh gate and one-shot 401 recovery.
pub struct SessionClient {
	http: ApiHttpClient,
	config: ClientConfig,
	store: Arc<TokenStore>,
	refresher: Arc<dyn Refresher>,
	gate: RefreshGate,
	events: Subscribers<SessionEvent>,
	reactive_metrics: RefreshMetrics,
}
impl SessionClient {
	/// Creates a client with a cookie-enabled HTTP client and the HTTP refresher.
	///
	/// The refresher shares the client's cookie jar, so the session cookie set at sign-in is
	/// presented to the refresh endpoint.
	pub fn new(config: ClientConfig, store: Arc<TokenStore>) -> Result<Self> {
		let http = ApiHttpClient::new()?;
		let refresher = Arc::new(HttpRefresher::new(http.clone(), &config));

		Ok(Self::with_parts(config, http, store, refresher))
	}

	/// Creates a client from explicit collaborators.
	pub fn with_parts(
		config: ClientConfig,
		http: ApiHttpClient,
		store: Arc<TokenStore>,
		refresher: Arc<dyn Refresher>,
	) -> Self {
		let gate = RefreshGate::from_config(store.clone(), refresher.clone(), &config);

		Self {
			http,
			config,
			store,
			refresher,
			gate,
			events: Subscribers::new(),
			reactive_metrics: RefreshMetrics::default(),
		}
	}

	/// Configuration the client was built with.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Token store shared with the gate.
	pub fn store(&self) -> &Arc<TokenStore> {
		&self.store
	}

	/// Proactive refresh gate.
	pub fn gate(&self) -> &RefreshGate {
		&self.gate
	}

	/// Counters for refresh calls issued by the 401 recovery path.
	pub fn reactive_metrics(&self) -> &RefreshMetrics {
		&self.reactive_metrics
	}

	/// Registers an observer for [`SessionEvent`]s.
	pub fn subscribe<F>(&self, handler: F) -> Subscription
	where
		F: 'static + Fn(&SessionEvent) + Send + Sync,
	{
		self.events.subscribe(handler)
	}

	/// Starts a request for `path` relative to the configured base URL.
	pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
		let url = self.config.url_for(path)?;

		Ok(self.request_url(method, url))
	}

	/// Starts a request for an absolute `url`, such as one of the configured endpoints.
	pub fn request_url(&self, method: Method, url: Url) -> RequestBuilder {
		self.http.request(method, url)
	}

	/// Sends `request` through the pipeline and returns the successful response.
	///
	/// Non-success responses and transport failures are normalized into [`Error::Api`].
	pub async fn execute(&self, request: Request) -> Result<Response> {
		let pass = self.gate.ensure_fresh_token().await;
		// A streaming body cannot be replayed, so such requests are never retried.
		let replay = request.try_clone();
		let response = self.send(request, pass.token.as_ref(), RequestPhase::Initial).await?;

		if response.status() != StatusCode::UNAUTHORIZED {
			return finish(response).await;
		}

		let Some(replay) = replay else {
			return finish(response).await;
		};

		trace_phase(replay.method(), replay.url(), RequestPhase::Recovering);

		let token = self.recover().await?;

		finish(self.send(replay, Some(&token), RequestPhase::Retried).await?).await
	}

	/// Sends a GET request and decodes the JSON body.
	pub async fn get_json<T>(&self, path: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let request = self.request(Method::GET, path)?.build().map_err(http::transport_error)?;

		http::decode_json(self.execute(request).await?).await
	}

	/// Sends a POST request with a JSON body and decodes the JSON response.
	pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		let request =
			self.request(Method::POST, path)?.json(body).build().map_err(http::transport_error)?;

		http::decode_json(self.execute(request).await?).await
	}

	/// Sends a DELETE request, discarding the response body.
	pub async fn delete(&self, path: &str) -> Result<()> {
		let request = self.request(Method::DELETE, path)?.build().map_err(http::transport_error)?;

		self.execute(request).await?;

		Ok(())
	}

	/// Clears the stored session and notifies observers.
	pub fn logout(&self) -> Result<()> {
		self.store.clear()?;
		self.events.publish(&SessionEvent::LoggedOut);

		Ok(())
	}

	async fn send(
		&self,
		mut request: Request,
		token: Option<&AccessToken>,
		phase: RequestPhase,
	) -> Result<Response> {
		if let Some(token) = token {
			request.headers_mut().insert(AUTHORIZATION, bearer(token)?);
		}

		trace_phase(request.method(), request.url(), phase);

		self.http.execute(request).await.map_err(http::transport_error)
	}

	async fn recover(&self) -> Result<AccessToken> {
		const KIND: OpKind = OpKind::ReactiveRefresh;

		let span = OpSpan::new(KIND, "recover_unauthorized");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);
		self.reactive_metrics.record_attempt();

		let result = span
			.instrument(refresh::refresh_within(
				self.refresher.as_ref(),
				KIND,
				self.config.refresh_timeout,
			))
			.await;

		match result {
			Ok(session) => {
				let token = session.token.clone();

				if let Err(err) = self.store.set(session) {
					obs::warn_soft_fail(KIND, &Error::from(err));
				}

				self.reactive_metrics.record_success();
				obs::record_op_outcome(KIND, OpOutcome::Success);
				self.events.publish(&SessionEvent::Refreshed);

				Ok(token)
			},
			Err(err) => {
				self.reactive_metrics.record_failure(&err);
				obs::record_op_outcome(KIND, OpOutcome::Failure);
				self.terminate(&err);

				Err(Error::SessionExpired)
			},
		}
	}

	fn terminate(&self, cause: &Error) {
		#[cfg(feature = "tracing")]
		tracing::warn!(error = %cause, "session recovery failed; clearing stored credentials");
		#[cfg(not(feature = "tracing"))]
		let _ = cause;

		if let Err(_err) = self.store.clear() {
			#[cfg(feature = "tracing")]
			tracing::warn!(
				error = %_err,
				"failed to remove persisted credentials; the in-memory session is cleared"
			);
		}

		self.events.publish(&SessionEvent::Terminated);
	}
}
impl Debug for SessionClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("gate", &self.gate)
			.field("subscribers", &self.events.len())
			.finish()
	}
}

async fn finish(response: Response) -> Result<Response> {
	if response.status().is_success() {
		Ok(response)
	} else {
		Err(http::api_error_from_response(response).await.into())
	}
}

fn bearer(token: &AccessToken) -> Result<HeaderValue> {
	let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
		.map_err(|_| ApiError::new(None, "Stored access token is not a valid header value."))?;

	value.set_sensitive(true);

	Ok(value)
}

fn trace_phase(method: &Method, url: &Url, phase: RequestPhase) {
	#[cfg(feature = "tracing")]
	tracing::debug!(%method, path = url.path(), phase = phase.as_str(), "sending request");
	#[cfg(not(feature = "tracing"))]
	let _ = (method, url, phase);
}
