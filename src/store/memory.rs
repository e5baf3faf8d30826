//! Process-local [`StorageBackend`] for tests, demos, and session-scoped native hosts.

// self
use crate::{
	_prelude::*,
	store::{StorageBackend, StoreError},
};

type StorageMap = Arc<RwLock<HashMap<String, String>>>;

/// Thread-safe in-memory storage area; clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage(StorageMap);
impl MemoryStorage {
	/// Creates a storage area pre-populated with `entries`.
	pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		let map = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();

		Self(Arc::new(RwLock::new(map)))
	}

	/// Number of stored keys.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Copies the current contents.
	pub fn snapshot(&self) -> HashMap<String, String> {
		self.0.read().clone()
	}
}
impl StorageBackend for MemoryStorage {
	fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.0.read().get(key).cloned())
	}

	fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
		self.0.write().insert(key.to_owned(), value.to_owned());

		Ok(())
	}

	fn remove_item(&self, key: &str) -> Result<(), StoreError> {
		self.0.write().remove(key);

		Ok(())
	}
}
