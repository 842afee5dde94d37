//! Request/response bodies of the target-platform REST bridge.

use serde::{Deserialize, Deserializer, Serialize};

/// Health/version probe path.
pub const ABOUT_PATH: &str = "/v1/about";

/// Message send path.
pub const SEND_PATH: &str = "/v2/send";

/// Returns the registration path for `number`.
pub fn register_path(number: &str) -> String {
	format!("/v1/register/{number}")
}

/// Body of `POST /v1/register/{number}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub use_voice: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub captcha: Option<String>,
}

/// Body of `POST /v2/send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
	pub message: String,
	/// Registered account the message is sent from.
	pub number: String,
	pub recipients: Vec<String>,
}

/// Successful `POST /v2/send` answer.
///
/// Bridges disagree on whether the timestamp is a JSON string or number, so
/// both are accepted and normalized to a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageResponse {
	#[serde(deserialize_with = "string_or_number")]
	pub timestamp: String,
}

/// `GET /v1/about` answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AboutResponse {
	#[serde(default)]
	pub versions: Vec<String>,
	#[serde(default)]
	pub build: Option<u32>,
	#[serde(default)]
	pub mode: Option<String>,
	#[serde(default)]
	pub version: Option<String>,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeErrorBody {
	pub error: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Text(String),
		Int(i64),
		Uint(u64),
	}

	Ok(match Raw::deserialize(deserializer)? {
		Raw::Text(text) => text,
		Raw::Int(value) => value.to_string(),
		Raw::Uint(value) => value.to_string(),
	})
}
