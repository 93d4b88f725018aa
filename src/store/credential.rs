//! Typed credential access over a [`KeyValueStore`].

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	store::{CompareAndSwapOutcome, KeyValueStore, StoreError, StoreWrite},
};

/// Storage key of the access token.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Storage key of the user id derived from the access token.
pub const USER_ID_KEY: &str = "userId";
/// Default storage key of the secondary (comment identity) session.
pub const DEFAULT_SECONDARY_SESSION_KEY: &str = "commentSession";

/// Process-wide credential store for the primary session and the secondary identity session.
///
/// The primary pair is written on sign-in and refresh and cleared on sign-out or forced logout.
/// The secondary session has its own lifecycle and is only cleared by its own 401 path.
#[derive(Clone)]
pub struct CredentialStore {
	backend: Arc<dyn KeyValueStore>,
	secondary_key: String,
}
impl CredentialStore {
	/// Wraps `backend` using the default secondary session key.
	pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
		Self::with_secondary_key(backend, DEFAULT_SECONDARY_SESSION_KEY)
	}

	/// Wraps `backend` using a custom secondary session key.
	pub fn with_secondary_key(
		backend: Arc<dyn KeyValueStore>,
		secondary_key: impl Into<String>,
	) -> Self {
		Self { backend, secondary_key: secondary_key.into() }
	}

	/// Returns the stored access token.
	pub async fn access_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		Ok(self.backend.get(ACCESS_TOKEN_KEY).await?.map(TokenSecret::new))
	}

	/// Returns the stored refresh token.
	pub async fn refresh_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		Ok(self.backend.get(REFRESH_TOKEN_KEY).await?.map(TokenSecret::new))
	}

	/// Returns the stored user id.
	pub async fn user_id(&self) -> Result<Option<String>, StoreError> {
		self.backend.get(USER_ID_KEY).await
	}

	/// Returns the full primary pair when both tokens are stored.
	pub async fn load(&self) -> Result<Option<CredentialPair>, StoreError> {
		let (Some(access_token), Some(refresh_token)) =
			(self.access_token().await?, self.refresh_token().await?)
		else {
			return Ok(None);
		};

		Ok(Some(CredentialPair { access_token, refresh_token, user_id: self.user_id().await? }))
	}

	/// Persists all three primary keys; a pair without a user id removes the stored one.
	pub async fn save(&self, pair: &CredentialPair) -> Result<(), StoreError> {
		self.backend.apply(Self::pair_writes(pair)).await
	}

	/// Persists `pair` only if the stored refresh token still equals `expected_refresh`.
	pub async fn rotate(
		&self,
		expected_refresh: &str,
		pair: &CredentialPair,
	) -> Result<CompareAndSwapOutcome, StoreError> {
		self.backend
			.compare_and_swap(REFRESH_TOKEN_KEY, Some(expected_refresh), Self::pair_writes(pair))
			.await
	}

	/// Removes the primary keys. Safe to call when nothing is stored.
	pub async fn clear(&self) -> Result<(), StoreError> {
		self.backend
			.apply(vec![
				StoreWrite::remove(ACCESS_TOKEN_KEY),
				StoreWrite::remove(REFRESH_TOKEN_KEY),
				StoreWrite::remove(USER_ID_KEY),
			])
			.await
	}

	/// Returns the secondary session record.
	pub async fn secondary_session(&self) -> Result<Option<String>, StoreError> {
		self.backend.get(&self.secondary_key).await
	}

	/// Stores the secondary session record.
	pub async fn set_secondary_session(&self, value: impl Into<String>) -> Result<(), StoreError> {
		self.backend.set(&self.secondary_key, value.into()).await
	}

	/// Removes the secondary session record without touching the primary pair.
	pub async fn clear_secondary_session(&self) -> Result<(), StoreError> {
		self.backend.remove(&self.secondary_key).await
	}

	fn pair_writes(pair: &CredentialPair) -> Vec<StoreWrite> {
		vec![
			StoreWrite::set(ACCESS_TOKEN_KEY, pair.access_token.expose()),
			StoreWrite::set(REFRESH_TOKEN_KEY, pair.refresh_token.expose()),
			match &pair.user_id {
				Some(user_id) => StoreWrite::set(USER_ID_KEY, user_id),
				None => StoreWrite::remove(USER_ID_KEY),
			},
		]
	}
}
impl Debug for CredentialStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialStore").field("secondary_key", &self.secondary_key).finish()
	}
}
