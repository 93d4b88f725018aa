//! Gateway configuration, buildable in code or loaded from a JSON document.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*, error::ConfigError, policy::EndpointPatterns,
	store::credential::DEFAULT_SECONDARY_SESSION_KEY,
};

/// Settings shared by the pipeline and the refresh coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
	/// Base URL that relative request paths are resolved against.
	pub base_url: Url,
	/// Path of the refresh endpoint, resolved against [`GatewayConfig::base_url`].
	#[serde(default = "GatewayConfig::default_refresh_path")]
	pub refresh_path: String,
	/// Route the user is sent to on forced logout.
	#[serde(default = "GatewayConfig::default_login_route")]
	pub login_route: String,
	/// Storage key of the secondary identity session.
	#[serde(default = "GatewayConfig::default_secondary_session_key")]
	pub secondary_session_key: String,
	/// URL fragments feeding the auth-failure rule table.
	#[serde(default)]
	pub endpoints: EndpointPatterns,
	/// Upper bound for the refresh call in milliseconds; unset waits indefinitely.
	#[serde(default)]
	pub refresh_timeout_ms: Option<u64>,
}
impl GatewayConfig {
	const DEFAULT_LOGIN_ROUTE: &'static str = "/login";
	const DEFAULT_REFRESH_PATH: &'static str = "/v1/users/refresh";

	/// Creates a configuration with defaults for everything but the base URL.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			refresh_path: Self::default_refresh_path(),
			login_route: Self::default_login_route(),
			secondary_session_key: Self::default_secondary_session_key(),
			endpoints: EndpointPatterns::default(),
			refresh_timeout_ms: None,
		}
	}

	/// Parses a JSON configuration document.
	pub fn from_json(document: &str) -> Result<Self, ConfigError> {
		let deserializer = &mut serde_json::Deserializer::from_str(document);

		serde_path_to_error::deserialize(deserializer)
			.map_err(|source| ConfigError::InvalidDocument { source })
	}

	/// Overrides the refresh endpoint path.
	pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the login route.
	pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
		self.login_route = route.into();

		self
	}

	/// Overrides the secondary session storage key.
	pub fn with_secondary_session_key(mut self, key: impl Into<String>) -> Self {
		self.secondary_session_key = key.into();

		self
	}

	/// Overrides the endpoint patterns.
	pub fn with_endpoints(mut self, endpoints: EndpointPatterns) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Bounds the refresh call; `None` restores the unbounded wait.
	pub fn with_refresh_timeout(mut self, timeout: Option<StdDuration>) -> Self {
		self.refresh_timeout_ms =
			timeout.map(|limit| u64::try_from(limit.as_millis()).unwrap_or(u64::MAX));

		self
	}

	/// Returns the refresh timeout, when configured.
	pub fn refresh_timeout(&self) -> Option<StdDuration> {
		self.refresh_timeout_ms.map(StdDuration::from_millis)
	}

	/// Resolves `path` against the base URL.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		self.base_url
			.join(path)
			.map_err(|source| ConfigError::InvalidUrl { value: path.to_owned(), source })
	}

	/// Returns the absolute refresh endpoint URL.
	pub fn refresh_url(&self) -> Result<Url, ConfigError> {
		self.resolve(&self.refresh_path)
	}

	fn default_refresh_path() -> String {
		Self::DEFAULT_REFRESH_PATH.to_owned()
	}

	fn default_login_route() -> String {
		Self::DEFAULT_LOGIN_ROUTE.to_owned()
	}

	fn default_secondary_session_key() -> String {
		DEFAULT_SECONDARY_SESSION_KEY.to_owned()
	}
}
