//! Bearer access tokens with lazily decoded, unverified expiry claims.
//!
//! The client never verifies token signatures; it only reads the payload segment to decide when
//! a proactive refresh is due. Anything that cannot be decoded is treated as already expired so a
//! malformed token can never look valid forever.

// std
use std::sync::OnceLock;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::_prelude::*;

/// Default remaining-lifetime cutoff below which a token is refreshed before use.
pub const NEAR_EXPIRY_WINDOW: Duration = Duration::hours(24);

/// Claims read from the token payload segment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
	/// Subject (user identifier).
	#[serde(default)]
	pub sub: Option<String>,
	/// User email address.
	#[serde(default)]
	pub email: Option<String>,
	/// Display name.
	#[serde(default)]
	pub name: Option<String>,
	/// Expiry as seconds since the Unix epoch.
	#[serde(default)]
	pub exp: Option<i64>,
}

/// Reasons a token payload could not be decoded.
#[derive(Debug, ThisError)]
pub enum ClaimsError {
	/// The token does not have a `header.payload.signature` shape.
	#[error("Token has no payload segment.")]
	MissingPayload,
	/// The payload segment is not valid base64url.
	#[error("Token payload is not valid base64.")]
	Base64(#[from] base64::DecodeError),
	/// The payload segment is not a JSON claims object.
	#[error("Token payload is not a JSON claims object.")]
	Json(#[from] serde_json::Error),
	/// The payload carries no `exp` claim.
	#[error("Token payload has no exp claim.")]
	MissingExpiry,
	/// The `exp` claim cannot be represented as a timestamp.
	#[error("Token exp claim is out of range.")]
	ExpiryOutOfRange,
}

/// Decodes the claims carried by a JWT-shaped token without verifying it.
pub fn decode_claims(raw: &str) -> Result<TokenClaims, ClaimsError> {
	let mut segments = raw.split('.');
	let payload = match (segments.next(), segments.next()) {
		(Some(_), Some(payload)) if !payload.is_empty() => payload,
		_ => return Err(ClaimsError::MissingPayload),
	};
	// Accept standard-alphabet and padded encodings as well as strict base64url.
	let normalized: String = payload
		.trim_end_matches('=')
		.chars()
		.map(|c| match c {
			'+' => '-',
			'/' => '_',
			other => other,
		})
		.collect();
	let bytes = URL_SAFE_NO_PAD.decode(normalized)?;

	Ok(serde_json::from_slice(&bytes)?)
}

/// Opaque bearer token plus its lazily derived expiry instant.
#[derive(Clone)]
pub struct AccessToken {
	raw: String,
	expires_at: OnceLock<Option<OffsetDateTime>>,
}
impl AccessToken {
	/// Wraps a raw bearer token.
	pub fn new(raw: impl Into<String>) -> Self {
		Self { raw: raw.into(), expires_at: OnceLock::new() }
	}

	/// Returns the raw token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.raw
	}

	/// Decodes the payload claims.
	pub fn claims(&self) -> Result<TokenClaims, ClaimsError> {
		decode_claims(&self.raw)
	}

	/// Returns the decoded expiry, or `None` when the payload cannot be decoded.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		*self.expires_at.get_or_init(|| {
			let decoded = self.claims().and_then(|claims| {
				let exp = claims.exp.ok_or(ClaimsError::MissingExpiry)?;

				OffsetDateTime::from_unix_timestamp(exp).map_err(|_| ClaimsError::ExpiryOutOfRange)
			});

			match decoded {
				Ok(instant) => Some(instant),
				Err(_err) => {
					#[cfg(feature = "tracing")]
					tracing::debug!(error = %_err, "token expiry undecodable; treating as expired");

					None
				},
			}
		})
	}

	/// Returns `true` if the token is expired at `now` or its expiry cannot be decoded.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		match self.expires_at() {
			Some(expires_at) => now >= expires_at,
			None => true,
		}
	}

	/// Convenience helper that checks expiry against the current UTC instant.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if less than `window` of lifetime remains at `now`, or the expiry cannot be
	/// decoded.
	pub fn is_near_expiry_at(&self, now: OffsetDateTime, window: Duration) -> bool {
		match self.expires_at() {
			Some(expires_at) => expires_at - now < window,
			None => true,
		}
	}

	/// Convenience helper for [`is_near_expiry_at`](Self::is_near_expiry_at) using the current
	/// UTC instant.
	pub fn is_near_expiry(&self, window: Duration) -> bool {
		self.is_near_expiry_at(OffsetDateTime::now_utc(), window)
	}
}
impl PartialEq for AccessToken {
	fn eq(&self, other: &Self) -> bool {
		self.raw == other.raw
	}
}
impl Eq for AccessToken {}
impl AsRef<str> for AccessToken {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AccessToken").field(&"<redacted>").finish()
	}
}
impl Display for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
