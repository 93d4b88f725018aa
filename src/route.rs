//! Navigation hooks used by forced logout and by route-aware classification.

// self
use crate::_prelude::*;

/// Host-side router as seen by the gateway.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Returns the route the user is currently on, when known.
	fn current_route(&self) -> Option<String>;

	/// Moves the user to `route`.
	fn navigate(&self, route: &str);
}

/// Navigator for headless hosts and tests; records every navigation.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
	current: RwLock<Option<String>>,
	history: Mutex<Vec<String>>,
}
impl MemoryNavigator {
	/// Creates a navigator positioned on `route`.
	pub fn at(route: impl Into<String>) -> Self {
		Self { current: RwLock::new(Some(route.into())), history: Default::default() }
	}

	/// Repositions the navigator without recording a navigation.
	pub fn set_route(&self, route: impl Into<String>) {
		*self.current.write() = Some(route.into());
	}

	/// Returns every route passed to [`Navigator::navigate`], oldest first.
	pub fn history(&self) -> Vec<String> {
		self.history.lock().clone()
	}
}
impl Navigator for MemoryNavigator {
	fn current_route(&self) -> Option<String> {
		self.current.read().clone()
	}

	fn navigate(&self, route: &str) {
		*self.current.write() = Some(route.to_owned());

		self.history.lock().push(route.to_owned());
	}
}
