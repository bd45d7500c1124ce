//! Transport helpers shared by the refresher, the interceptor, and the cache fetchers.
//!
//! Every failure leaving this module is normalized into [`ApiError`]: the message is taken from
//! the JSON body's `message` field when the server sent one, then from the transport, then from
//! [`FALLBACK_MESSAGE`](crate::error::FALLBACK_MESSAGE).

// std
use std::ops::Deref;
// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::{ApiError, ConfigError},
};

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The default client keeps a cookie jar: the refresh endpoint authenticates with the session
/// cookie set at sign-in, never with a request body.
#[derive(Clone, Debug)]
pub struct ApiHttpClient(pub ReqwestClient);
impl ApiHttpClient {
	/// Builds a client with a cookie store enabled.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().cookie_store(true).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
impl AsRef<ReqwestClient> for ApiHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ApiHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ServerMessage {
	One(String),
	Many(Vec<String>),
}

#[derive(Deserialize)]
struct ServerErrorBody {
	message: Option<ServerMessage>,
}

/// Extracts the server-supplied `message` from a JSON error body.
///
/// Validation failures carry an array of messages; those are joined with `", "`.
pub fn extract_message(body: &[u8]) -> Option<String> {
	let parsed: ServerErrorBody = serde_json::from_slice(body).ok()?;
	let message = match parsed.message? {
		ServerMessage::One(message) => message,
		ServerMessage::Many(messages) => messages.join(", "),
	};

	if message.trim().is_empty() { None } else { Some(message) }
}

/// Normalizes a non-success response into an [`ApiError`].
pub async fn api_error_from_response(response: reqwest::Response) -> ApiError {
	let status = response.status();
	let server_message = match response.bytes().await {
		Ok(body) => extract_message(&body),
		Err(_) => None,
	};
	let message = server_message
		.unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));

	ApiError::new(Some(status.as_u16()), message)
}

/// Normalizes a transport failure (DNS, TCP, TLS, body read) into an [`ApiError`].
pub fn api_error_from_transport(err: &ReqwestError) -> ApiError {
	let status = err.status().map(|status| status.as_u16());
	let message = err.to_string();

	if message.trim().is_empty() {
		ApiError::fallback(status)
	} else {
		ApiError::new(status, message)
	}
}

/// [`api_error_from_transport`] lifted into [`Error`], for use with `map_err`.
pub fn transport_error(err: ReqwestError) -> Error {
	api_error_from_transport(&err).into()
}

/// Decodes a successful response body, reporting the JSON path that failed to parse.
pub async fn decode_json<T>(response: reqwest::Response) -> Result<T>
where
	T: DeserializeOwned,
{
	let status = response.status().as_u16();
	let body = response.bytes().await.map_err(transport_error)?;
	let de = &mut serde_json::Deserializer::from_slice(&body);

	serde_path_to_error::deserialize(de)
		.map_err(|source| Error::Decode { source, status: Some(status) })
}
