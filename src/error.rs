//! Client-level error types shared across the gate, interceptor, cache, and stores.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Fallback message used when neither the server nor the transport supplied one.
pub const FALLBACK_MESSAGE: &str = "An unexpected error occurred.";

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Normalized failure returned by the API or the transport underneath it.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// Cache fetch failed and no stale value was available.
	#[error(transparent)]
	Fetch(#[from] FetchError),
	/// Response body could not be decoded into the expected shape.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured parsing failure with the JSON path that broke.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// An external collaborator did not settle in time.
	#[error("{operation} did not settle within {after}.")]
	Timeout {
		/// Operation label (see [`crate::obs::OpKind`]).
		operation: &'static str,
		/// Configured bound that elapsed.
		after: Duration,
	},
	/// Reactive recovery failed; stored credentials were cleared and the user must sign in again.
	#[error("Session expired. Please sign in again.")]
	SessionExpired,
}
impl Error {
	/// Returns the human-readable message UI layers should present.
	pub fn message(&self) -> String {
		match self {
			Self::Api(err) => err.message.clone(),
			Self::Fetch(err) => err.message.clone(),
			other => other.to_string(),
		}
	}

	/// Returns the HTTP status associated with the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Api(err) => err.status,
			Self::Fetch(err) => err.status,
			Self::Decode { status, .. } => *status,
			_ => None,
		}
	}

	/// Returns `true` when the failure represents a 401 response.
	pub fn is_unauthorized(&self) -> bool {
		self.status() == Some(401)
	}
}

/// Uniform `{message}` error shape surfaced to calling UI layers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("{message}")]
pub struct ApiError {
	/// HTTP status code; `None` for transport failures that never produced a response.
	pub status: Option<u16>,
	/// Human-readable message.
	pub message: String,
}
impl ApiError {
	/// Creates a normalized error.
	pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
		Self { status, message: message.into() }
	}

	/// Creates an error carrying the fallback message.
	pub fn fallback(status: Option<u16>) -> Self {
		Self::new(status, FALLBACK_MESSAGE)
	}
}

/// Shareable cache fetch failure handed to every caller attached to the same fetch.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{message}")]
pub struct FetchError {
	/// HTTP status code of the failed fetch, when available.
	pub status: Option<u16>,
	/// Human-readable message.
	pub message: String,
}
impl From<&Error> for FetchError {
	fn from(err: &Error) -> Self {
		Self { status: err.status(), message: err.message() }
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL uses a scheme other than http or https.
	#[error("Base URL scheme `{scheme}` is not supported.")]
	UnsupportedScheme {
		/// Offending scheme.
		scheme: String,
	},
	/// Endpoint path does not start with `/`.
	#[error("The {field} path `{path}` must start with `/`.")]
	InvalidPath {
		/// Configuration field name.
		field: &'static str,
		/// Offending path.
		path: String,
	},
	/// Endpoint URL could not be joined onto the base URL.
	#[error("The {field} path cannot be joined onto the base URL.")]
	InvalidEndpoint {
		/// Configuration field name.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A duration setting was zero or negative.
	#[error("The {field} duration must be positive.")]
	NonPositiveDuration {
		/// Configuration field name.
		field: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
