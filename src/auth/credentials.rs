//! Primary session credentials as persisted by the credential store.

// self
use crate::{
	_prelude::*,
	auth::{claims, secret::TokenSecret},
};

/// Access/refresh token pair plus the user id derived from the access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
	/// Access token attached as the bearer credential.
	pub access_token: TokenSecret,
	/// Refresh token exchanged for a new pair.
	pub refresh_token: TokenSecret,
	/// Subject claim of the access token, when it decodes.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
}
impl CredentialPair {
	/// Builds a pair and derives the user id from the access token's subject claim.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		let access_token = TokenSecret::new(access_token);
		let user_id = claims::subject_of(access_token.expose());

		Self { access_token, refresh_token: TokenSecret::new(refresh_token), user_id }
	}
}
