//! Token storage: the in-process [`TokenStore`] and the key-value persistence boundary behind it.
//!
//! The access token and the user summary are persisted under [`ACCESS_TOKEN_KEY`] and
//! [`USER_KEY`] so a restarted client can resume its session. Only the gate and the interceptor
//! mutate the store; everything else reads.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Session, UserSummary},
};

/// Key holding the raw access token string.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Key holding the JSON user summary `{sub, email, name}`.
pub const USER_KEY: &str = "user";

/// Key-value persistence area surviving restarts (but not synced across devices).
pub trait KeyValueStore
where
	Self: Send + Sync,
{
	/// Reads the value stored under `key`.
	fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Stores `value` under `key`, replacing any previous value.
	fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

	/// Removes `key`; removing a missing key is not an error.
	fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Error type produced by [`KeyValueStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[derive(Default)]
struct Current {
	token: Option<AccessToken>,
	user: Option<UserSummary>,
}

/// Holds the current access token and user summary, mirroring them into a [`KeyValueStore`].
pub struct TokenStore {
	backend: Arc<dyn KeyValueStore>,
	current: RwLock<Current>,
}
impl TokenStore {
	/// Creates an empty store on top of `backend` without reading it.
	pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
		Self { backend, current: RwLock::new(Current::default()) }
	}

	/// Creates a store and loads any previously persisted session from `backend`.
	///
	/// An unreadable user payload is dropped; an unreadable backend is an error.
	pub fn restore(backend: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
		let token = backend.get(ACCESS_TOKEN_KEY)?.map(AccessToken::new);
		let user = match backend.get(USER_KEY)? {
			Some(raw) => parse_user(&raw),
			None => None,
		};

		Ok(Self { backend, current: RwLock::new(Current { token, user }) })
	}

	/// Returns the current access token, if any.
	pub fn token(&self) -> Option<AccessToken> {
		self.current.read().token.clone()
	}

	/// Returns the current user summary, if any.
	pub fn user(&self) -> Option<UserSummary> {
		self.current.read().user.clone()
	}

	/// Returns `true` when a token is stored.
	pub fn is_authenticated(&self) -> bool {
		self.current.read().token.is_some()
	}

	/// Replaces the stored session and persists it.
	///
	/// The in-memory copy is updated even when persistence fails so in-flight requests keep
	/// using the newest token.
	pub fn set(&self, session: Session) -> Result<(), StoreError> {
		let user = session.resolved_user();

		{
			let mut current = self.current.write();

			current.token = Some(session.token.clone());
			current.user = user.clone();
		}

		self.backend.set(ACCESS_TOKEN_KEY, session.token.expose().to_owned())?;

		match user {
			Some(user) => {
				let payload = serde_json::to_string(&user).map_err(|e| {
					StoreError::Serialization { message: format!("Failed to encode user: {e}") }
				})?;

				self.backend.set(USER_KEY, payload)
			},
			None => self.backend.remove(USER_KEY),
		}
	}

	/// Clears the in-memory session and both persisted keys.
	pub fn clear(&self) -> Result<(), StoreError> {
		*self.current.write() = Current::default();

		self.backend.remove(ACCESS_TOKEN_KEY)?;
		self.backend.remove(USER_KEY)
	}
}
impl Debug for TokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let current = self.current.read();

		f.debug_struct("TokenStore")
			.field("token", &current.token)
			.field("user", &current.user)
			.finish()
	}
}

fn parse_user(raw: &str) -> Option<UserSummary> {
	let de = &mut serde_json::Deserializer::from_str(raw);

	match serde_path_to_error::deserialize(de) {
		Ok(user) => Some(user),
		Err(_err) => {
			#[cfg(feature = "tracing")]
			tracing::warn!(path = %_err.path(), "dropping unreadable persisted user summary");

			None
		},
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_client_error_with_source() {
		let store_error = StoreError::Backend { message: "disk full".into() };
		let client_error: Error = store_error.clone().into();

		assert!(matches!(client_error, Error::Storage(_)));
		assert!(client_error.to_string().contains("disk full"));

		let source = StdError::source(&client_error)
			.expect("Client error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn set_persists_token_and_user_and_clear_removes_both() {
		let backend = Arc::new(MemoryStore::default());
		let store = TokenStore::new(backend.clone());
		let user = UserSummary::new("u-1", "lifter@example.com", "Lifter");

		store
			.set(Session::new(AccessToken::new("opaque-token")).with_user(user.clone()))
			.expect("Memory backend should accept the session.");

		assert_eq!(store.token().map(|t| t.expose().to_owned()), Some("opaque-token".into()));
		assert_eq!(store.user(), Some(user));
		assert_eq!(
			backend.get(ACCESS_TOKEN_KEY).expect("Memory backend reads never fail."),
			Some("opaque-token".into())
		);

		let raw_user = backend
			.get(USER_KEY)
			.expect("Memory backend reads never fail.")
			.expect("User payload should be persisted.");

		assert!(raw_user.contains("\"email\":\"lifter@example.com\""));

		store.clear().expect("Clearing the memory backend should succeed.");

		assert!(!store.is_authenticated());
		assert_eq!(store.user(), None);
		assert_eq!(backend.get(ACCESS_TOKEN_KEY).expect("Memory backend reads never fail."), None);
		assert_eq!(backend.get(USER_KEY).expect("Memory backend reads never fail."), None);
	}

	#[test]
	fn persistence_runs_without_holding_the_session_lock() {
		struct ObservingBackend {
			store: Mutex<Option<Arc<TokenStore>>>,
			seen: Mutex<Vec<Option<AccessToken>>>,
		}
		impl KeyValueStore for ObservingBackend {
			fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
				Ok(None)
			}

			fn set(&self, key: &str, _: String) -> Result<(), StoreError> {
				if key == ACCESS_TOKEN_KEY
					&& let Some(store) = self.store.lock().as_ref()
				{
					// `None` here means the write lock is still held.
					let token = store.current.try_read().and_then(|current| current.token.clone());

					self.seen.lock().push(token);
				}

				Ok(())
			}

			fn remove(&self, _: &str) -> Result<(), StoreError> {
				Ok(())
			}
		}

		let backend = Arc::new(ObservingBackend {
			store: Mutex::new(None),
			seen: Mutex::new(Vec::new()),
		});
		let store = Arc::new(TokenStore::new(backend.clone()));

		*backend.store.lock() = Some(store.clone());

		store
			.set(Session::new(AccessToken::new("opaque-token")))
			.expect("Observing backend accepts every write.");
		backend.store.lock().take();

		assert_eq!(*backend.seen.lock(), vec![Some(AccessToken::new("opaque-token"))]);
	}

	#[test]
	fn restore_reloads_session_and_drops_bad_user_payload() {
		let backend = Arc::new(MemoryStore::default());

		backend.set(ACCESS_TOKEN_KEY, "persisted".into()).expect("Seeding token should succeed.");
		backend.set(USER_KEY, "{\"sub\":42}".into()).expect("Seeding user should succeed.");

		let store = TokenStore::restore(backend).expect("Restoring from memory should succeed.");

		assert_eq!(store.token(), Some(AccessToken::new("persisted")));
		assert_eq!(store.user(), None);
	}
}
