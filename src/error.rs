//! Gateway-level error types shared by the pipeline, the refresh coordinator, and the stores.

// self
use crate::{_prelude::*, policy::AuthPolicy};

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
///
/// Callers only ever see a normalized payload or one of these variants; status and business
/// variants display the server's human-readable message.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS); no response was received.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The envelope reported `result: "ERROR"`.
	#[error("{message}")]
	Business {
		/// Machine-readable code from `error.code`, when supplied.
		code: Option<String>,
		/// Server-supplied message.
		message: String,
	},
	/// Non-2xx response outside the auth-failure statuses.
	#[error(transparent)]
	Rejected(StatusError),
	/// 401 rejected without (or after exhausting) session recovery.
	#[error("{source}")]
	Unauthorized {
		/// Policy the classifier applied to the failure.
		policy: AuthPolicy,
		/// Original failed response.
		#[source]
		source: StatusError,
	},
	/// 403 response; the primary session has been cleared.
	#[error(transparent)]
	Forbidden(StatusError),
	/// The shared refresh this call was queued behind did not produce a token.
	#[error("Session refresh failed: {0}")]
	RefreshFailed(#[from] RefreshFailure),
	/// Unwrapped payload does not match the requested type.
	#[error("Response payload does not match the expected shape.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl Error {
	/// Returns the HTTP status tied to the error, when one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected(e) | Self::Forbidden(e) | Self::Unauthorized { source: e, .. } =>
				Some(e.status),
			Self::RefreshFailed(RefreshFailure::Rejected(e)) => Some(e.status),
			_ => None,
		}
	}
}

/// Non-2xx response summary carried by status-based errors.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{message}")]
pub struct StatusError {
	/// HTTP status code.
	pub status: u16,
	/// Human-readable message, taken from the body when present.
	pub message: String,
}
impl StatusError {
	/// Builds a status error, deriving the message from an error body when possible.
	pub fn new(status: u16, body: &Value) -> Self {
		let message = crate::envelope::error_message(body)
			.unwrap_or_else(|| format!("Request failed with status {status}."));

		Self { status, message }
	}
}

/// Reasons a shared refresh did not produce a new access token.
///
/// Cloned to every caller queued behind the refresh.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshFailure {
	/// No refresh token is stored; no network call was made.
	#[error("No refresh token is stored.")]
	MissingRefreshToken,
	/// Refresh endpoint answered with a failure status or an error envelope.
	#[error("Refresh endpoint rejected the request: {0}")]
	Rejected(StatusError),
	/// Refresh endpoint could not be reached.
	#[error("Refresh endpoint is unreachable: {message}.")]
	Transport {
		/// Transport error rendered as text.
		message: String,
	},
	/// Refresh response lacks the expected token fields.
	#[error("Refresh response is malformed: {message}.")]
	MalformedResponse {
		/// Parser message including the failing path.
		message: String,
	},
	/// Stored refresh token changed while the refresh was in flight.
	#[error("Session ended while the refresh was in flight.")]
	SessionEnded,
	/// Refresh call exceeded the configured timeout.
	#[error("Refresh call timed out.")]
	TimedOut,
	/// Refreshing task was dropped before it settled.
	#[error("Refresh was abandoned before completing.")]
	Abandoned,
	/// Credential store failure while reading or rotating tokens.
	#[error("{0}")]
	Storage(crate::store::StoreError),
}

/// Configuration and validation failures raised by the gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A configured URL or path cannot be parsed.
	#[error("Configured URL `{value}` is invalid.")]
	InvalidUrl {
		/// Offending input.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Configuration document cannot be parsed.
	#[error("Gateway configuration is invalid.")]
	InvalidDocument {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {url}.")]
	Network {
		/// Target URL of the failed call.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
	/// Bearer token holds bytes that are not valid in an `Authorization` header; nothing was sent.
	#[error("Bearer token cannot be encoded as an `Authorization` header.")]
	InvalidCredential,
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: &Url, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { url: url.to_string(), source: Box::new(src) }
	}
}
