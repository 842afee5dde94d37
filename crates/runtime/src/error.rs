use std::io;
use std::time::Duration;

use thiserror::Error;

/// Failures of the bridge service lifecycle.
#[derive(Debug, Error)]
pub enum SupervisorError {
	#[error("bridge service failed to start: {0}")]
	StartupFailed(String),

	#[error("bridge service not ready after {}ms (limit {}ms)", waited.as_millis(), limit.as_millis())]
	StartupTimeout { waited: Duration, limit: Duration },

	#[error("failed to spawn `{program}`: {source}")]
	Spawn {
		program: String,
		#[source]
		source: io::Error,
	},

	#[error("bridge service exited unexpectedly ({0})")]
	Exited(String),

	#[error("bridge service thread panicked")]
	Panicked,

	#[error("I/O error: {0}")]
	Io(#[from] io::Error),
}

impl SupervisorError {
	/// Returns `true` for failures that happened before readiness was observed.
	pub fn is_startup(&self) -> bool {
		matches!(self, Self::StartupFailed(_) | Self::StartupTimeout { .. })
	}
}
