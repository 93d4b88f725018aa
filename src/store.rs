//! Key-value storage contracts and built-in backends for session credentials.

pub mod credential;
pub mod file;
pub mod memory;

pub use credential::CredentialStore;
pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`KeyValueStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistent string key-value storage backing the credential store.
pub trait KeyValueStore
where
	Self: Send + Sync,
{
	/// Fetches the value stored under `key`, if present.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Applies every write as one atomic batch.
	fn apply(&self, writes: Vec<StoreWrite>) -> StoreFuture<'_, ()>;

	/// Applies `writes` only if `guard_key` currently holds `expected` (`None` meaning absent).
	fn compare_and_swap<'a>(
		&'a self,
		guard_key: &'a str,
		expected: Option<&'a str>,
		writes: Vec<StoreWrite>,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;

	/// Stores `value` under `key`, replacing any previous value.
	fn set(&self, key: &str, value: String) -> StoreFuture<'_, ()> {
		self.apply(vec![StoreWrite::set(key, value)])
	}

	/// Removes `key`; removing an absent key succeeds.
	fn remove(&self, key: &str) -> StoreFuture<'_, ()> {
		self.apply(vec![StoreWrite::remove(key)])
	}
}

/// Single mutation inside a store batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreWrite {
	/// Insert or replace a value.
	Set {
		/// Target key.
		key: String,
		/// New value.
		value: String,
	},
	/// Delete a value if present.
	Remove {
		/// Target key.
		key: String,
	},
}
impl StoreWrite {
	/// Builds a [`StoreWrite::Set`].
	pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
		Self::Set { key: key.into(), value: value.into() }
	}

	/// Builds a [`StoreWrite::Remove`].
	pub fn remove(key: impl Into<String>) -> Self {
		Self::Remove { key: key.into() }
	}

	pub(crate) fn apply_to(self, map: &mut HashMap<String, String>) {
		match self {
			Self::Set { key, value } => {
				map.insert(key, value);
			},
			Self::Remove { key } => {
				map.remove(&key);
			},
		}
	}
}

/// Result of a guarded batch write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The guard key held the expected value and the batch was applied.
	Updated,
	/// The guard key held something else; nothing was written.
	Mismatch,
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

pub(crate) fn guard_matches(current: Option<&String>, expected: Option<&str>) -> bool {
	current.map(String::as_str) == expected
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_gateway_error_with_source() {
		let store_error = StoreError::Backend { message: "disk unavailable".into() };
		let gateway_error: Error = store_error.clone().into();

		assert!(matches!(gateway_error, Error::Storage(_)));
		assert!(gateway_error.to_string().contains("disk unavailable"));

		let source = StdError::source(&gateway_error)
			.expect("Gateway error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn writes_apply_in_order() {
		let mut map = HashMap::new();

		StoreWrite::set("a", "1").apply_to(&mut map);
		StoreWrite::set("a", "2").apply_to(&mut map);
		StoreWrite::remove("missing").apply_to(&mut map);

		assert_eq!(map.get("a").map(String::as_str), Some("2"));
		assert!(guard_matches(map.get("a"), Some("2")));
		assert!(guard_matches(map.get("missing"), None));
		assert!(!guard_matches(map.get("a"), None));
	}
}
