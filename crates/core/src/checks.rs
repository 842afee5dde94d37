//! Filesystem checks run before the browser and bridge are started.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{RelayError, Result};
use crate::layout::AppPaths;

const PROBE_FILE: &str = ".wsr-write-probe";

/// Creates `dir` (and parents) when missing.
pub fn ensure_dir(dir: &Path) -> Result<()> {
	if dir.is_dir() {
		return Ok(());
	}
	fs::create_dir_all(dir).map_err(|e| RelayError::from_io(dir, "write", e))?;
	debug!(target: "wsr.checks", dir = %dir.display(), "created directory");
	Ok(())
}

/// Verifies files can be created in `dir` by writing and removing a probe.
pub fn check_writable(dir: &Path) -> Result<()> {
	let probe = dir.join(PROBE_FILE);
	fs::write(&probe, b"").map_err(|e| RelayError::from_io(dir, "write", e))?;
	fs::remove_file(&probe).map_err(|e| RelayError::from_io(dir, "write", e))?;
	Ok(())
}

/// Adds `entry` to `dir/.gitignore` unless a line already matches it.
///
/// Returns whether the file was changed.
pub fn ensure_gitignore_entry(dir: &Path, entry: &str) -> Result<bool> {
	let path = dir.join(".gitignore");
	let existing = match fs::read_to_string(&path) {
		Ok(content) => content,
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
		Err(err) => return Err(RelayError::from_io(&path, "read", err)),
	};

	let bare = entry.trim_start_matches('/');
	if existing.lines().map(str::trim).any(|line| line.trim_start_matches('/') == bare) {
		return Ok(false);
	}

	let mut file = OpenOptions::new()
		.create(true)
		.append(true)
		.open(&path)
		.map_err(|e| RelayError::from_io(&path, "write", e))?;
	let separator = if existing.is_empty() || existing.ends_with('\n') { "" } else { "\n" };
	write!(file, "{separator}{entry}\n").map_err(|e| RelayError::from_io(&path, "write", e))?;

	info!(target: "wsr.checks", path = %path.display(), entry, "added ignore entry");
	Ok(true)
}

/// Prepares the application directory tree.
///
/// The root and QR directory must exist and be writable, and the credentials
/// file is kept out of version control when the root sits in a repository.
pub fn pre_launch_checks(paths: &AppPaths) -> Result<()> {
	for dir in [paths.root().to_path_buf(), paths.qr_dir()] {
		ensure_dir(&dir)?;
		check_writable(&dir)?;
	}
	ensure_gitignore_entry(paths.root(), paths.credentials_file_name())?;
	debug!(target: "wsr.checks", root = %paths.root().display(), "pre-launch checks passed");
	Ok(())
}
