use std::path::PathBuf;

use thiserror::Error;
use wsr::RelayError;
use wsr_runtime::SupervisorError;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Relay(#[from] RelayError),

	#[error(transparent)]
	Service(#[from] SupervisorError),

	#[error("failed to read config {}: {source}", path.display())]
	Config {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("invalid config {}: {field} must be greater than zero", path.display())]
	InvalidSetting { path: PathBuf, field: &'static str },

	#[error("no home directory found; pass --app-dir")]
	NoHomeDir,

	#[error("no chat name contains {0:?}")]
	ChatNotFound(String),

	#[error("logging setup failed: {0}")]
	Logging(String),

	#[error("{0}")]
	Context(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),
}

impl CliError {
	/// Errors after which `wsr run --retries` bootstraps the source session again.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Relay(RelayError::Timeout { .. } | RelayError::FatalSession(_)))
	}
}

pub type Result<T> = std::result::Result<T, CliError>;
