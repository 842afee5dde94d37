//! Records produced by the source chat page.

use serde::{Deserialize, Serialize};

/// A chat as listed by the source page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRef {
	pub id: String,
	#[serde(default)]
	pub name: String,
}

/// An unread message as reported by the source page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMessage {
	/// Page-assigned message id, used as the relay cursor marker.
	pub id: String,
	pub chat_id: String,
	#[serde(default)]
	pub sender: Option<String>,
	#[serde(default)]
	pub body: String,
	/// Seconds since the epoch as reported by the page.
	#[serde(default)]
	pub timestamp: i64,
}

/// Result envelope of the page-side unread query.
///
/// `logged_in` is reported alongside the messages so a session that was
/// revoked from the phone is detected on the same round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadBatch {
	pub logged_in: bool,
	#[serde(default)]
	pub messages: Vec<SourceMessage>,
}
