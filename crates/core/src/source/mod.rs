//! Source chat platform capability and chat selection.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{error, info};
pub use wsr_protocol::{ChatRef, SourceMessage};

use crate::error::Result;

pub mod cdp;

pub use cdp::{CdpSourceClient, CdpSourceOptions};

/// Operations the relay needs from the source platform client.
///
/// Implementations report a revoked or closed session as
/// [`RelayError::FatalSession`](crate::RelayError::FatalSession); every other
/// failure is treated as transient by the callers.
#[async_trait]
pub trait SourceClient: Send + Sync {
	/// Renders the current pairing QR to a local file and returns its path.
	async fn request_pairing_artifact(&self) -> Result<PathBuf>;

	async fn is_logged_in(&self) -> Result<bool>;

	async fn list_chats(&self) -> Result<Vec<ChatRef>>;

	/// Unread messages of `chat`, oldest first.
	async fn fetch_unread(&self, chat: &ChatRef) -> Result<Vec<SourceMessage>>;
}

/// Picks the first chat whose name contains `filter`.
pub fn select_chat(chats: &[ChatRef], filter: &str) -> Option<ChatRef> {
	match chats.iter().find(|chat| chat.name.contains(filter)) {
		Some(chat) => {
			info!(target: "wsr.session", chat = %chat.name, filter, "found chat");
			Some(chat.clone())
		}
		None => {
			error!(target: "wsr.session", filter, available = chats.len(), "no chat found containing filter");
			None
		}
	}
}
