//! Signed-in user summary and the session pair returned by refresh calls.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenClaims},
};

/// User summary persisted next to the access token (`{sub, email, name}`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
	/// User identifier.
	pub sub: String,
	/// Email address.
	pub email: String,
	/// Display name.
	#[serde(default)]
	pub name: String,
}
impl UserSummary {
	/// Creates a summary from its parts.
	pub fn new(sub: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
		Self { sub: sub.into(), email: email.into(), name: name.into() }
	}

	/// Derives a summary from decoded claims; requires both `sub` and `email`.
	pub fn from_claims(claims: &TokenClaims) -> Option<Self> {
		Some(Self {
			sub: claims.sub.clone()?,
			email: claims.email.clone()?,
			name: claims.name.clone().unwrap_or_default(),
		})
	}
}

/// Token plus optional user summary, as produced by a successful refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
	/// Bearer token to attach to outgoing requests.
	pub token: AccessToken,
	/// User summary supplied by the server, if any.
	pub user: Option<UserSummary>,
}
impl Session {
	/// Creates a session without an explicit user summary.
	pub fn new(token: AccessToken) -> Self {
		Self { token, user: None }
	}

	/// Attaches the server-supplied user summary.
	pub fn with_user(mut self, user: UserSummary) -> Self {
		self.user = Some(user);

		self
	}

	/// Returns the explicit user summary, falling back to one derived from the token claims.
	pub fn resolved_user(&self) -> Option<UserSummary> {
		self.user
			.clone()
			.or_else(|| self.token.claims().ok().as_ref().and_then(UserSummary::from_claims))
	}
}
