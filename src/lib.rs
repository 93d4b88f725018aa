//! Client-side API gateway that attaches session credentials, unwraps `{result, data, error}`
//! envelopes, and transparently recovers from expired access tokens with a single-flight refresh.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod obs;
pub mod policy;
pub mod route;
pub mod store;
pub mod transport;
#[cfg(feature = "reqwest")]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and fixtures shared by the integration tests.

	pub use crate::_prelude::*;

	// crates.io
	use jsonwebtoken::{EncodingKey, Header};
	// self
	use crate::{
		gateway::{Gateway, GatewayConfig},
		route::MemoryNavigator,
		store::{KeyValueStore, MemoryStore},
		transport::ReqwestTransport,
	};

	/// Gateway type alias used by reqwest-backed integration tests.
	pub type ReqwestTestGateway = Gateway<ReqwestTransport>;

	/// Builds a token whose payload carries the provided claims.
	///
	/// The token is signed with a throwaway key; the gateway never verifies signatures.
	pub fn fake_jwt(sub: &str, expires_at: OffsetDateTime, role: Option<&str>) -> String {
		let mut claims = serde_json::json!({ "sub": sub, "exp": expires_at.unix_timestamp() });

		if let Some(role) = role {
			claims["role"] = role.into();
		}

		jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(b"fixture"))
			.expect("Fixture token should encode.")
	}

	/// Constructs a [`Gateway`] against `base_url` backed by an in-memory store and a recording
	/// navigator positioned on `/`.
	pub fn build_reqwest_test_gateway(
		base_url: &str,
	) -> (ReqwestTestGateway, Arc<MemoryStore>, Arc<MemoryNavigator>) {
		let base_url = Url::parse(base_url).expect("Test base URL should parse successfully.");
		let store = Arc::new(MemoryStore::default());
		let backend: Arc<dyn KeyValueStore> = store.clone();
		let navigator = Arc::new(MemoryNavigator::at("/"));
		let gateway = Gateway::with_transport(
			GatewayConfig::new(base_url),
			backend,
			navigator.clone(),
			ReqwestTransport::default(),
		)
		.expect("Test gateway configuration should be valid.");

		(gateway, store, navigator)
	}
}

mod _prelude {
	pub use std::{
		collections::{HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use http::{HeaderMap, HeaderValue, Method, StatusCode};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use http;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
