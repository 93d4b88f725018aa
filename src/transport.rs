//! Request descriptors, responses, and the transport seam used by the gateway.
//!
//! [`HttpTransport`] is the gateway's only dependency on an HTTP stack. The pipeline sends every
//! intercepted call through it, and the refresh coordinator calls it directly so the refresh
//! request itself is never intercepted. Implementations must return non-2xx responses as
//! [`ApiResponse`] values and reserve [`TransportError`] for calls that produced no response.

// std
use std::ops::Deref;
// crates.io
use http::header::{AUTHORIZATION, CONTENT_TYPE};
// self
use crate::{_prelude::*, auth::TokenSecret, error::TransportError};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP clients capable of executing gateway calls.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` and returns the response, whatever its status.
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// Outbound call descriptor.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Request headers.
	pub headers: HeaderMap,
	/// Optional JSON body.
	pub body: Option<Value>,
	/// Set once the call has been resent after a refresh; a descriptor is resent at most once.
	pub retried: bool,
}
impl ApiRequest {
	/// Creates a descriptor without headers or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None, retried: false }
	}

	/// Shorthand for a `GET` descriptor.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Shorthand for a `POST` descriptor.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Attaches a JSON body.
	pub fn with_json(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: http::header::HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Supplies a caller-owned bearer token that the gateway will not overwrite.
	pub fn with_bearer(mut self, token: &TokenSecret) -> Result<Self, TransportError> {
		self.set_bearer(token)?;

		Ok(self)
	}

	/// Returns `true` when an `Authorization` header is present.
	pub fn has_authorization(&self) -> bool {
		self.headers.contains_key(AUTHORIZATION)
	}

	/// Sets `Authorization: Bearer <token>`, replacing any previous value.
	///
	/// Tokens that cannot be rendered as a header value leave the descriptor untouched and fail
	/// with [`TransportError::InvalidCredential`].
	pub fn set_bearer(&mut self, token: &TokenSecret) -> Result<(), TransportError> {
		let value = token.bearer_header().ok_or(TransportError::InvalidCredential)?;

		self.headers.insert(AUTHORIZATION, value);

		Ok(())
	}
}

/// Response as seen by the gateway.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Parsed JSON body; empty bodies become `null` and non-JSON bodies become a string.
	pub body: Value,
}
impl ApiResponse {
	/// Creates a response without headers.
	pub fn new(status: StatusCode, body: Value) -> Self {
		Self { status, headers: HeaderMap::new(), body }
	}

	/// Decodes raw body bytes using the rules described on [`ApiResponse::body`].
	pub fn decode_body(bytes: &[u8]) -> Value {
		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Value::Null;
		}

		serde_json::from_slice(bytes)
			.unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	async fn send(client: ReqwestClient, request: ApiRequest) -> Result<ApiResponse, TransportError> {
		let ApiRequest { method, url, mut headers, body, .. } = request;

		if body.is_some() && !headers.contains_key(CONTENT_TYPE) {
			headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		}

		let mut builder = client.request(method, url.clone()).headers(headers);

		if let Some(body) = body {
			builder = builder.body(body.to_string());
		}

		let response = builder.send().await.map_err(|e| TransportError::network(&url, e))?;
		let status = response.status();
		let headers = response.headers().to_owned();
		let bytes = response.bytes().await.map_err(|e| TransportError::network(&url, e))?;

		Ok(ApiResponse { status, headers, body: ApiResponse::decode_body(&bytes) })
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(Self::send(self.0.clone(), request))
	}
}
