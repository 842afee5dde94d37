//! Global tracing subscriber setup.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{CliError, Result};

/// Log files kept on disk: the active one plus two rotated backups.
pub const MAX_LOG_FILES: usize = 3;

/// Filter directive for a `-v` count; `RUST_LOG` takes precedence.
pub fn level_for(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "warn",
		1 => "info",
		2 => "debug",
		_ => "trace",
	}
}

/// Daily-rotating appender writing `<file name>.<date>` next to `log_file`.
pub fn file_appender(log_file: &Path) -> Result<RollingFileAppender> {
	let dir = log_file.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
	let prefix = log_file
		.file_name()
		.and_then(|name| name.to_str())
		.ok_or_else(|| CliError::Logging(format!("log path {} has no file name", log_file.display())))?;

	std::fs::create_dir_all(dir)?;
	RollingFileAppender::builder()
		.rotation(Rotation::DAILY)
		.filename_prefix(prefix)
		.max_log_files(MAX_LOG_FILES)
		.build(dir)
		.map_err(|e| CliError::Logging(e.to_string()))
}

/// Installs stderr output and, when `log_file` is given, a rotating plain-text file layer.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// until the process is about to exit.
pub fn init_logging(verbosity: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));
	let stderr = fmt::layer().with_writer(std::io::stderr).with_target(true).with_ansi(true);

	let (file_layer, guard) = match log_file {
		Some(path) => {
			let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
			let layer = fmt::layer()
				.with_writer(writer)
				.with_target(true)
				.with_file(true)
				.with_line_number(true)
				.with_ansi(false);
			(Some(layer), Some(guard))
		}
		None => (None, None),
	};

	tracing_subscriber::registry()
		.with(filter)
		.with(stderr)
		.with(file_layer)
		.try_init()
		.map_err(|e| CliError::Logging(e.to_string()))?;
	Ok(guard)
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn verbosity_maps_to_levels() {
		assert_eq!(level_for(0), "warn");
		assert_eq!(level_for(1), "info");
		assert_eq!(level_for(2), "debug");
		assert_eq!(level_for(9), "trace");
	}

	#[test]
	fn file_layer_writes_to_dated_log_in_nested_dir() {
		let tmp = TempDir::new().unwrap();
		let log_file = tmp.path().join("logs").join("relay.log");

		let guard = init_logging(0, Some(&log_file)).unwrap();
		tracing::warn!(target: "wsr", "bridge went away");
		drop(guard);

		let entries: Vec<_> = std::fs::read_dir(tmp.path().join("logs"))
			.unwrap()
			.map(|entry| entry.unwrap().path())
			.collect();
		assert_eq!(entries.len(), 1, "{entries:?}");
		let name = entries[0].file_name().unwrap().to_string_lossy().to_string();
		assert!(name.starts_with("relay.log."), "{name}");
		let content = std::fs::read_to_string(&entries[0]).unwrap();
		assert!(content.contains("bridge went away"), "{content}");
		assert!(!content.contains("\u{1b}["), "file output must be plain text");
	}
}
