#![allow(dead_code)]

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};
use tokio::sync::Notify;
// self
use liftlog_client::{
	auth::{AccessToken, Session, UserSummary},
	error::ApiError,
	refresh::{RefreshFuture, Refresher},
	store::{MemoryStore, TokenStore},
};

/// Builds an unsigned JWT-shaped token whose payload carries the provided claims.
pub fn token_with_claims(claims: serde_json::Value) -> AccessToken {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
	let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

	AccessToken::new(format!("{header}.{payload}.signature"))
}

/// Builds a token expiring `lifetime` from now for the fixture user.
pub fn token_expiring_in(lifetime: Duration) -> AccessToken {
	let exp = (OffsetDateTime::now_utc() + lifetime).unix_timestamp();

	token_with_claims(serde_json::json!({
		"sub": "user-1",
		"email": "lifter@example.com",
		"name": "Lifter",
		"exp": exp,
	}))
}

/// Builds a memory-backed [`TokenStore`] seeded with `token` when provided.
pub fn memory_token_store(token: Option<AccessToken>) -> Arc<TokenStore> {
	let store = Arc::new(TokenStore::new(Arc::new(MemoryStore::default())));

	if let Some(token) = token {
		store
			.set(Session::new(token))
			.expect("Memory-backed token store should accept the fixture session.");
	}

	store
}

/// Scripted [`Refresher`] that counts calls and can be held open until released.
#[derive(Debug)]
pub struct ScriptedRefresher {
	calls: AtomicUsize,
	outcome: Option<AccessToken>,
	hold: Mutex<Option<Arc<Notify>>>,
	hang: bool,
}
impl ScriptedRefresher {
	/// Refresher that succeeds with `token` on every call.
	pub fn succeeding(token: AccessToken) -> Self {
		Self { calls: AtomicUsize::new(0), outcome: Some(token), hold: Mutex::new(None), hang: false }
	}

	/// Refresher that fails with a 401 on every call.
	pub fn failing() -> Self {
		Self { calls: AtomicUsize::new(0), outcome: None, hold: Mutex::new(None), hang: false }
	}

	/// Refresher whose calls never complete.
	pub fn hanging() -> Self {
		Self { hang: true, ..Self::failing() }
	}

	/// Holds every call open until the returned [`Notify`] is triggered.
	pub fn held(self) -> (Self, Arc<Notify>) {
		let notify = Arc::new(Notify::new());

		*self.hold.lock() = Some(notify.clone());

		(self, notify)
	}

	/// Returns how many times the refresher has been invoked.
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl Refresher for ScriptedRefresher {
	fn refresh(&self) -> RefreshFuture<'_> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let hold = self.hold.lock().clone();
		let outcome = self.outcome.clone();
		let hang = self.hang;

		Box::pin(async move {
			if hang {
				std::future::pending::<()>().await;
			}
			if let Some(notify) = hold {
				notify.notified().await;
			}

			match outcome {
				Some(token) => Ok(Session::new(token).with_user(UserSummary::new(
					"user-1",
					"lifter@example.com",
					"Lifter",
				))),
				None => Err(ApiError::new(Some(401), "Refresh token expired.").into()),
			}
		})
	}
}
