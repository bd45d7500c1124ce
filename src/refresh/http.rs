// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Session, UserSummary},
	config::ClientConfig,
	http::{self, ApiHttpClient},
	refresh::{RefreshFuture, Refresher},
};

#[derive(Deserialize)]
struct RefreshResponse {
	#[serde(rename = "accessToken", alias = "access_token")]
	access_token: String,
	#[serde(default)]
	user: Option<RefreshUser>,
}

#[derive(Deserialize)]
struct RefreshUser {
	#[serde(default)]
	sub: Option<serde_json::Value>,
	#[serde(default)]
	id: Option<serde_json::Value>,
	#[serde(default)]
	email: Option<String>,
	#[serde(default)]
	name: Option<String>,
}
impl RefreshUser {
	fn into_summary(self) -> Option<UserSummary> {
		let sub = match self.sub.or(self.id)? {
			serde_json::Value::String(sub) => sub,
			other => other.to_string(),
		};

		Some(UserSummary::new(sub, self.email?, self.name.unwrap_or_default()))
	}
}

/// [`Refresher`] that calls `POST {base}/auth/refresh` with no body, relying on the cookie jar.
#[derive(Clone, Debug)]
pub struct HttpRefresher {
	client: ApiHttpClient,
	endpoint: Url,
}
impl HttpRefresher {
	/// Creates a refresher for the configured refresh endpoint.
	pub fn new(client: ApiHttpClient, config: &ClientConfig) -> Self {
		Self { client, endpoint: config.refresh_url.clone() }
	}

	/// Returns the endpoint this refresher posts to.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}
}
impl Refresher for HttpRefresher {
	fn refresh(&self) -> RefreshFuture<'_> {
		Box::pin(async move {
			let response = self
				.client
				.post(self.endpoint.clone())
				.send()
				.await
				.map_err(http::transport_error)?;

			if !response.status().is_success() {
				return Err(http::api_error_from_response(response).await.into());
			}

			let body: RefreshResponse = http::decode_json(response).await?;
			let session = Session::new(AccessToken::new(body.access_token));

			// Without a complete user payload the summary is derived from the token claims.
			Ok(match body.user.and_then(RefreshUser::into_summary) {
				Some(user) => session.with_user(user),
				None => session,
			})
		})
	}
}
