//! Thread-safe in-memory [`KeyValueStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{self, CompareAndSwapOutcome, KeyValueStore, StoreFuture, StoreWrite},
};

type StoreMap = Arc<RwLock<HashMap<String, String>>>;

/// Thread-safe storage backend that keeps values in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Returns a copy of every stored entry.
	pub fn snapshot(&self) -> HashMap<String, String> {
		self.0.read().clone()
	}

	fn apply_now(map: StoreMap, writes: Vec<StoreWrite>) {
		let mut guard = map.write();

		writes.into_iter().for_each(|write| write.apply_to(&mut guard));
	}

	fn cas_now(
		map: StoreMap,
		guard_key: &str,
		expected: Option<&str>,
		writes: Vec<StoreWrite>,
	) -> CompareAndSwapOutcome {
		let mut guard = map.write();

		if !store::guard_matches(guard.get(guard_key), expected) {
			return CompareAndSwapOutcome::Mismatch;
		}

		writes.into_iter().for_each(|write| write.apply_to(&mut guard));

		CompareAndSwapOutcome::Updated
	}
}
impl KeyValueStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn apply(&self, writes: Vec<StoreWrite>) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			Self::apply_now(map, writes);

			Ok(())
		})
	}

	fn compare_and_swap<'a>(
		&'a self,
		guard_key: &'a str,
		expected: Option<&'a str>,
		writes: Vec<StoreWrite>,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::cas_now(map, guard_key, expected, writes)) })
	}
}
