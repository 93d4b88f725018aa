//! Request pipeline that every outbound API call passes through.

pub mod config;
pub mod refresh;

pub use config::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	auth::{self, CredentialPair},
	envelope,
	error::{ConfigError, StatusError},
	obs::{self, CallSpan, Outcome, Stage},
	policy::{AuthPolicy, EndpointClassifier, FailureContext},
	route::Navigator,
	store::{CredentialStore, KeyValueStore},
	transport::{ApiRequest, HttpTransport},
};
#[cfg(feature = "reqwest")] use crate::transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Gateway specialized for the crate's default reqwest transport.
pub type ReqwestGateway = Gateway<ReqwestTransport>;

/// Client-side gateway composing credentials, envelope unwrapping, classification, and refresh.
///
/// Cloning is cheap and clones share the credential store and the refresh coordinator, so every
/// clone participates in the same single-flight refresh.
pub struct Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Transport used for intercepted calls and for the refresh call.
	pub transport: Arc<T>,
	/// Primary and secondary session storage.
	pub credentials: CredentialStore,
	/// Router hooks for route-aware rules and forced logout.
	pub navigator: Arc<dyn Navigator>,
	/// Auth-failure rule table.
	pub classifier: Arc<EndpointClassifier>,
	/// Gateway settings.
	pub config: Arc<GatewayConfig>,
	refresh: Arc<RefreshCoordinator>,
	refresh_url: Url,
}
impl<T> Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a gateway that reuses the caller-provided transport.
	pub fn with_transport(
		config: GatewayConfig,
		store: Arc<dyn KeyValueStore>,
		navigator: Arc<dyn Navigator>,
		transport: impl Into<Arc<T>>,
	) -> Result<Self, ConfigError> {
		let refresh_url = config.refresh_url()?;
		let credentials =
			CredentialStore::with_secondary_key(store, config.secondary_session_key.clone());
		let classifier = EndpointClassifier::from_patterns(&config.endpoints);

		Ok(Self {
			transport: transport.into(),
			credentials,
			navigator,
			classifier: Arc::new(classifier),
			config: Arc::new(config),
			refresh: Default::default(),
			refresh_url,
		})
	}

	/// Replaces the rule table derived from the configuration.
	pub fn with_classifier(mut self, classifier: EndpointClassifier) -> Self {
		self.classifier = Arc::new(classifier);

		self
	}

	/// Returns the single-flight refresh coordinator shared by every clone.
	pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
		&self.refresh
	}

	/// Returns the refresh counters.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		self.refresh.metrics()
	}

	/// Sends `request` through the pipeline and returns the normalized payload.
	pub async fn send(&self, request: ApiRequest) -> Result<Value> {
		const STAGE: Stage = Stage::Dispatch;

		let span = CallSpan::new(STAGE, "send");

		obs::record_outcome(STAGE, Outcome::Attempt);

		let result = span.instrument(self.dispatch(request)).await;

		match &result {
			Ok(_) => obs::record_outcome(STAGE, Outcome::Success),
			Err(_) => obs::record_outcome(STAGE, Outcome::Failure),
		}

		result
	}

	/// Sends `request` and deserializes the normalized payload into `R`.
	pub async fn send_as<R>(&self, request: ApiRequest) -> Result<R>
	where
		R: DeserializeOwned,
	{
		let payload = self.send(request).await?;

		serde_path_to_error::deserialize(payload).map_err(|source| Error::Decode { source })
	}

	/// Sends a `GET` to `path`, resolved against the base URL.
	pub async fn get(&self, path: &str) -> Result<Value> {
		self.send(self.request(Method::GET, path, None)?).await
	}

	/// Sends a `POST` with a JSON body to `path`.
	pub async fn post(&self, path: &str, body: Value) -> Result<Value> {
		self.send(self.request(Method::POST, path, Some(body))?).await
	}

	/// Sends a `PUT` with a JSON body to `path`.
	pub async fn put(&self, path: &str, body: Value) -> Result<Value> {
		self.send(self.request(Method::PUT, path, Some(body))?).await
	}

	/// Sends a `PATCH` with a JSON body to `path`.
	pub async fn patch(&self, path: &str, body: Value) -> Result<Value> {
		self.send(self.request(Method::PATCH, path, Some(body))?).await
	}

	/// Sends a `DELETE` to `path`.
	pub async fn delete(&self, path: &str) -> Result<Value> {
		self.send(self.request(Method::DELETE, path, None)?).await
	}

	/// Builds a descriptor for `path` resolved against the base URL.
	pub fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<ApiRequest> {
		let mut request = ApiRequest::new(method, self.config.resolve(path)?);

		request.body = body;

		Ok(request)
	}

	/// Persists the credentials returned by a successful login.
	pub async fn sign_in(&self, pair: &CredentialPair) -> Result<()> {
		Ok(self.credentials.save(pair).await?)
	}

	/// Clears the primary session. Safe to call when already signed out.
	pub async fn sign_out(&self) -> Result<()> {
		Ok(self.credentials.clear().await?)
	}

	/// Returns `true` when the stored access token carries the admin role.
	///
	/// Missing or undecodable tokens are not admin.
	pub async fn is_admin(&self) -> Result<bool> {
		let token = self.credentials.access_token().await?;

		Ok(token.is_some_and(|token| auth::is_admin(token.expose())))
	}

	/// Returns `true` when the stored access token is missing, undecodable, or expired.
	pub async fn session_expired(&self) -> Result<bool> {
		let token = self.credentials.access_token().await?;
		let now = OffsetDateTime::now_utc();

		Ok(token.is_none_or(|token| auth::is_expired_at(token.expose(), now)))
	}

	/// Stores the secondary identity session record.
	pub async fn set_secondary_session(&self, value: impl Into<String>) -> Result<()> {
		Ok(self.credentials.set_secondary_session(value).await?)
	}

	/// Returns the secondary identity session record.
	pub async fn secondary_session(&self) -> Result<Option<String>> {
		Ok(self.credentials.secondary_session().await?)
	}

	async fn dispatch(&self, mut request: ApiRequest) -> Result<Value> {
		let caller_credentials = request.has_authorization();

		if !caller_credentials {
			if let Some(token) = self.credentials.access_token().await? {
				request.set_bearer(&token)?;
			}
		}

		loop {
			let response = self.transport.execute(request.clone()).await?;

			if response.status.is_success() {
				return envelope::unwrap(response.body);
			}

			let failure = StatusError::new(response.status.as_u16(), &response.body);
			let current_route = self.navigator.current_route();
			let context = FailureContext {
				status: failure.status,
				url: request.url.as_str(),
				current_route: current_route.as_deref(),
				retried: request.retried,
			};
			let Some(policy) = self.classifier.classify(&context) else {
				return Err(Error::Rejected(failure));
			};

			obs::record_auth_policy(policy, failure.status);

			match policy {
				AuthPolicy::SessionExempt => {
					// The caller still receives the original failure if the store cannot be cleared.
					let _ = self.credentials.clear_secondary_session().await;

					return Err(Error::Unauthorized { policy, source: failure });
				},
				AuthPolicy::AuthEndpointPassthrough | AuthPolicy::PublicReadPassthrough =>
					return Err(Error::Unauthorized { policy, source: failure }),
				// Refreshing the primary session cannot fix a caller-supplied credential.
				AuthPolicy::RefreshEligible if caller_credentials =>
					return Err(Error::Unauthorized { policy, source: failure }),
				AuthPolicy::RefreshEligible => {
					let token = self.recover_session(failure).await?;

					request.retried = true;
					request.set_bearer(&token)?;
				},
				AuthPolicy::ForcedLogout => {
					self.force_logout().await;

					return Err(if failure.status == StatusCode::FORBIDDEN.as_u16() {
						Error::Forbidden(failure)
					} else {
						Error::Unauthorized { policy, source: failure }
					});
				},
			}
		}
	}

	/// Clears the primary session and navigates to the login route.
	pub(crate) async fn force_logout(&self) {
		// The caller still receives the original failure if the store cannot be cleared.
		let _ = self.credentials.clear().await;

		self.navigator.navigate(&self.config.login_route);
	}
}
#[cfg(feature = "reqwest")]
impl Gateway<ReqwestTransport> {
	/// Creates a gateway with its own reqwest-backed transport.
	pub fn new(
		config: GatewayConfig,
		store: Arc<dyn KeyValueStore>,
		navigator: Arc<dyn Navigator>,
	) -> Result<Self, ConfigError> {
		Self::with_transport(config, store, navigator, ReqwestTransport::default())
	}
}
impl<T> Clone for Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			credentials: self.credentials.clone(),
			navigator: self.navigator.clone(),
			classifier: self.classifier.clone(),
			config: self.config.clone(),
			refresh: self.refresh.clone(),
			refresh_url: self.refresh_url.clone(),
		}
	}
}
impl<T> Debug for Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("config", &self.config)
			.field("credentials", &self.credentials)
			.field("refreshing", &self.refresh.is_refreshing())
			.finish()
	}
}
