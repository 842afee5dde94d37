//! Error taxonomy shared by the relay components.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use wsr_runtime::SupervisorError;

/// Result alias used throughout `wsr`.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors surfaced by bootstrap, identity handling, and relaying.
#[derive(Debug, Error)]
pub enum RelayError {
	/// Login was not observed before the bootstrap deadline.
	#[error("source login not completed after {}s (timeout {}s)", elapsed.as_secs(), timeout.as_secs())]
	Timeout { elapsed: Duration, timeout: Duration },

	/// The bridge service could not be started or failed while running.
	#[error(transparent)]
	Service(#[from] SupervisorError),

	#[error("invalid identity: {0}")]
	Validation(String),

	/// The operator typed the exit sentinel at the identity prompt.
	#[error("identity entry aborted by operator")]
	IdentityEntryAborted,

	#[error("no {check} permission for {}", path.display())]
	Permission { path: PathBuf, check: &'static str },

	#[error("fetching unread messages failed: {0}")]
	TransientFetch(String),

	#[error("forwarding message failed: {0}")]
	TransientForward(String),

	/// The source session is gone; the owner must bootstrap again.
	#[error("source session is no longer valid: {0}")]
	FatalSession(String),

	#[error("devtools protocol error: {0}")]
	Cdp(String),

	#[error("{0}")]
	Context(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("YAML error: {0}")]
	Yaml(#[from] serde_yaml::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),
}

impl RelayError {
	/// Maps an I/O error on `path` to [`RelayError::Permission`] when access was denied.
	pub fn from_io(path: impl Into<PathBuf>, check: &'static str, err: std::io::Error) -> Self {
		if err.kind() == std::io::ErrorKind::PermissionDenied {
			Self::Permission { path: path.into(), check }
		} else {
			Self::Io(err)
		}
	}

	/// Errors the relay loop logs and retries on the next tick.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::TransientFetch(_) | Self::TransientForward(_) | Self::Cdp(_) | Self::Http(_))
	}

	pub fn is_fatal_session(&self) -> bool {
		matches!(self, Self::FatalSession(_))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn timeout_message_reports_elapsed_and_limit() {
		let err = RelayError::Timeout {
			elapsed: Duration::from_secs(6),
			timeout: Duration::from_secs(5),
		};
		assert_eq!(err.to_string(), "source login not completed after 6s (timeout 5s)");
	}

	#[test]
	fn permission_denied_io_errors_become_permission_errors() {
		let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
		let err = RelayError::from_io("/root/qr_codes", "write", denied);
		assert_eq!(err.to_string(), "no write permission for /root/qr_codes");

		let missing = std::io::Error::from(std::io::ErrorKind::NotFound);
		assert!(matches!(RelayError::from_io("/x", "read", missing), RelayError::Io(_)));
	}

	#[test]
	fn classification() {
		assert!(RelayError::TransientFetch("x".into()).is_transient());
		assert!(!RelayError::FatalSession("x".into()).is_transient());
		assert!(RelayError::FatalSession("x".into()).is_fatal_session());
	}
}
