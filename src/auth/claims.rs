//! Token inspector: reads the claims of a signed token without verifying its signature.
//!
//! Decoding never fails the caller. Malformed tokens yield no claims, and the checks built on top
//! of the claims fail closed: a token without a readable payload or expiry counts as expired, and
//! a token without a readable role is not an admin.

// crates.io
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
// self
use crate::_prelude::*;

/// Role label that grants admin privileges.
pub const ADMIN_ROLE: &str = "ADMIN";

/// Claims read from a token payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenClaims {
	/// Subject (user) identifier; numeric subjects are rendered as strings.
	pub subject: Option<String>,
	/// Expiry as a Unix timestamp in seconds.
	pub expires_at: Option<i64>,
	/// Role label, when present.
	pub role: Option<String>,
}
impl TokenClaims {
	/// Returns `true` when the claims carry the admin role (case-insensitive).
	pub fn is_admin(&self) -> bool {
		self.role.as_deref().is_some_and(|role| role.eq_ignore_ascii_case(ADMIN_ROLE))
	}

	/// Returns `true` when the expiry is at or before `now`, or when no expiry is present.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		match self.expiry() {
			Some(expiry) => expiry <= now,
			None => true,
		}
	}

	/// Converts the expiry claim into an instant.
	pub fn expiry(&self) -> Option<OffsetDateTime> {
		OffsetDateTime::from_unix_timestamp(self.expires_at?).ok()
	}

	fn from_payload(payload: &Value) -> Option<Self> {
		let object = payload.as_object()?;
		let subject = match object.get("sub") {
			Some(Value::String(sub)) => Some(sub.clone()),
			Some(Value::Number(sub)) => Some(sub.to_string()),
			_ => None,
		};
		let expires_at = object.get("exp").and_then(|exp| {
			exp.as_i64().or_else(|| exp.as_f64().map(|secs| secs as i64))
		});
		let role = object.get("role").and_then(Value::as_str).map(str::to_owned);

		Some(Self { subject, expires_at, role })
	}
}

/// Decodes the claims of `token`, returning `None` on any malformed input.
///
/// Only the claims are read. The signature, expiry, and audience are left to the server.
pub fn inspect(token: &str) -> Option<TokenClaims> {
	let mut validation = Validation::new(Algorithm::HS256);

	validation.insecure_disable_signature_validation();
	validation.validate_exp = false;
	validation.validate_aud = false;
	validation.required_spec_claims.clear();

	// The key is ignored once signature validation is disabled.
	let payload =
		jsonwebtoken::decode::<Value>(token, &DecodingKey::from_secret(b"ignored"), &validation)
			.ok()?
			.claims;

	TokenClaims::from_payload(&payload)
}

/// Returns the subject claim of `token`, if it can be decoded.
pub fn subject_of(token: &str) -> Option<String> {
	inspect(token)?.subject
}

/// Fail-closed expiry check: undecodable tokens are treated as expired.
pub fn is_expired_at(token: &str, now: OffsetDateTime) -> bool {
	inspect(token).is_none_or(|claims| claims.is_expired_at(now))
}

/// Fail-closed privilege check: undecodable tokens are treated as non-admin.
pub fn is_admin(token: &str) -> bool {
	inspect(token).is_some_and(|claims| claims.is_admin())
}
