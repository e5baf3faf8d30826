//! Persistent key-value store over a host-provided storage backend.
//!
//! [`Store`] mirrors browser `localStorage`/`sessionStorage` semantics: string keys and
//! values, an availability probe before each operation, and an append mode used to
//! accumulate `||`-delimited lists. Backend failures are logged and reported as `false`
//! or `None`; they never reach the caller as errors.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

// self
use crate::{_prelude::*, log::Logger};

/// Keys persisted by the authentication context.
pub mod keys {
	/// `|`-terminated list of resources with cached tokens.
	pub const TOKEN_KEYS: &str = "adal.token.keys";
	/// Prefix of the per-resource access token slot.
	pub const ACCESS_TOKEN_KEY: &str = "adal.access.token.key";
	/// Prefix of the per-resource expiration slot (epoch seconds).
	pub const EXPIRATION_KEY: &str = "adal.expiration.key";
	/// Outstanding login states.
	pub const STATE_LOGIN: &str = "adal.state.login";
	/// Outstanding redirect renewal states.
	pub const STATE_RENEW: &str = "adal.state.renew";
	/// Nonces sent with identity-token requests.
	pub const NONCE_IDTOKEN: &str = "adal.nonce.idtoken";
	/// Session state returned by the authority.
	pub const SESSION_STATE: &str = "adal.session.state";
	/// Reserved user name slot.
	pub const USERNAME: &str = "adal.username";
	/// Raw identity token of the signed-in user.
	pub const IDTOKEN: &str = "adal.idtoken";
	/// Last error code.
	pub const ERROR: &str = "adal.error";
	/// Last error description.
	pub const ERROR_DESCRIPTION: &str = "adal.error.description";
	/// Page to return to after a redirect login.
	pub const LOGIN_REQUEST: &str = "adal.login.request";
	/// Last login failure description.
	pub const LOGIN_ERROR: &str = "adal.login.error";
	/// Prefix of the per-resource renewal status slot.
	pub const RENEW_STATUS: &str = "adal.token.renew.status";
	/// JSON array of outstanding renewal states.
	pub const RENEW_STATES: &str = "adal.token.renew.states";

	/// Delimiter terminating each entry of [`TOKEN_KEYS`].
	pub const RESOURCE_DELIMITER: &str = "|";
	/// Delimiter terminating each value appended in preserve mode.
	pub const CACHE_DELIMITER: &str = "||";

	/// Builds a per-resource key from one of the prefixes above.
	pub fn scoped(prefix: &str, resource: &str) -> String {
		format!("{prefix}{resource}")
	}
}

const PROBE_KEY: &str = "storageTest";
const PROBE_VALUE: &str = "A";

/// Storage backend contract, modelled on the Web Storage API.
pub trait StorageBackend
where
	Self: Send + Sync,
{
	/// Reads a value.
	fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Writes a value, replacing any existing one.
	fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;

	/// Deletes a value; deleting a missing key is not an error.
	fn remove_item(&self, key: &str) -> Result<(), StoreError>;
}

/// Error type produced by [`StorageBackend`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure (quota, I/O, access denied).
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Which browser storage area backs the cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheLocation {
	/// Survives browser restarts; supports preserve-mode appends.
	LocalStorage,
	/// Scoped to the browsing session.
	#[default]
	SessionStorage,
}
impl CacheLocation {
	/// Returns a stable label for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			CacheLocation::LocalStorage => "localStorage",
			CacheLocation::SessionStorage => "sessionStorage",
		}
	}
}
impl Display for CacheLocation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Key-value store bound to a single backend for its whole lifetime.
#[derive(Clone)]
pub struct Store {
	backend: Option<Arc<dyn StorageBackend>>,
	location: CacheLocation,
	logger: Logger,
}
impl Store {
	/// Binds a store to `backend`; `None` models a host without that storage area.
	pub fn new(
		backend: Option<Arc<dyn StorageBackend>>,
		location: CacheLocation,
		logger: Logger,
	) -> Self {
		Self { backend, location, logger }
	}

	/// Storage area selected at construction.
	pub fn location(&self) -> CacheLocation {
		self.location
	}

	/// Saves `value` under `key`, returning `false` when storage is unavailable.
	///
	/// With `preserve` on local storage the value and a `||` terminator are appended to
	/// the existing value; session storage always overwrites.
	pub fn save(&self, key: &str, value: &str, preserve: bool) -> bool {
		let Some(backend) = self.available() else {
			return false;
		};
		let result = if preserve && self.location == CacheLocation::LocalStorage {
			backend.get_item(key).and_then(|existing| {
				let mut combined = existing.unwrap_or_default();

				combined.push_str(value);
				combined.push_str(keys::CACHE_DELIMITER);

				backend.set_item(key, &combined)
			})
		} else {
			backend.set_item(key, value)
		};

		match result {
			Ok(()) => true,
			Err(e) => {
				self.logger.info(&format!("Failed to write {key} to {}: {e}", self.location));

				false
			},
		}
	}

	/// Reads the value under `key`, returning `None` when absent or unavailable.
	pub fn get(&self, key: &str) -> Option<String> {
		let backend = self.available()?;

		match backend.get_item(key) {
			Ok(value) => value,
			Err(e) => {
				self.logger.info(&format!("Failed to read {key} from {}: {e}", self.location));

				None
			},
		}
	}

	/// Reads a value and treats an empty string as absent.
	pub fn get_non_empty(&self, key: &str) -> Option<String> {
		self.get(key).filter(|value| !value.is_empty())
	}

	/// Runs the write/read/delete probe against the backend.
	pub fn is_available(&self) -> bool {
		self.available().is_some()
	}

	fn available(&self) -> Option<&Arc<dyn StorageBackend>> {
		let Some(backend) = self.backend.as_ref() else {
			self.logger.info(&format!("{} is not supported", self.location));

			return None;
		};

		if probe(backend.as_ref()) {
			Some(backend)
		} else {
			self.logger.info(&format!("{} is not supported", self.location));

			None
		}
	}
}
impl Debug for Store {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Store")
			.field("location", &self.location)
			.field("attached", &self.backend.is_some())
			.finish()
	}
}

fn probe(backend: &dyn StorageBackend) -> bool {
	let round_trip = || -> Result<bool, StoreError> {
		backend.set_item(PROBE_KEY, PROBE_VALUE)?;

		if backend.get_item(PROBE_KEY)?.as_deref() != Some(PROBE_VALUE) {
			return Ok(false);
		}

		backend.remove_item(PROBE_KEY)?;

		Ok(backend.get_item(PROBE_KEY)?.is_none_or(|value| value.is_empty()))
	};

	round_trip().unwrap_or(false)
}
