//! Normalization of the `{result, data, error}` response envelope.
//!
//! Every 2xx body passes through [`unwrap`]: `SUCCESS` envelopes yield their `data`, `ERROR`
//! envelopes become [`Error::Business`], and anything else is returned untouched.

// self
use crate::_prelude::*;

/// Message used when an `ERROR` envelope carries no message of its own.
pub const GENERIC_FAILURE_MESSAGE: &str = "Request failed.";

/// Discriminator carried in the envelope's `result` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvelopeResult {
	/// Call succeeded; the payload lives under `data`.
	Success,
	/// Call failed; details live under `error`.
	Error,
}
impl EnvelopeResult {
	/// Parses the wire label; unknown labels return `None`.
	pub fn from_label(label: &str) -> Option<Self> {
		match label {
			"SUCCESS" => Some(Self::Success),
			"ERROR" => Some(Self::Error),
			_ => None,
		}
	}
}

/// Error details of an `ERROR` envelope.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeError {
	/// Machine-readable error code.
	#[serde(default)]
	pub code: Option<String>,
	/// Human-readable message.
	#[serde(default)]
	pub message: Option<String>,
}

/// Unwraps a 2xx body into its payload or a business error.
pub fn unwrap(body: Value) -> Result<Value> {
	let result = match &body {
		Value::Object(map) => map.get("result").and_then(Value::as_str).and_then(EnvelopeResult::from_label),
		_ => None,
	};

	match (result, body) {
		(Some(EnvelopeResult::Success), Value::Object(mut map)) =>
			Ok(map.remove("data").unwrap_or(Value::Null)),
		(Some(EnvelopeResult::Error), body) => {
			let code = body
				.get("error")
				.and_then(|error| error.get("code"))
				.and_then(Value::as_str)
				.map(str::to_owned);
			let message =
				error_message(&body).unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_owned());

			Err(Error::Business { code, message })
		},
		(_, body) => Ok(body),
	}
}

/// Extracts a human-readable message from an error body.
///
/// Looks at `error.message` first and falls back to the legacy top-level `message`.
pub fn error_message(body: &Value) -> Option<String> {
	body.get("error")
		.and_then(|error| error.get("message"))
		.and_then(Value::as_str)
		.or_else(|| body.get("message").and_then(Value::as_str))
		.filter(|message| !message.is_empty())
		.map(str::to_owned)
}
