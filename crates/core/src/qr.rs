//! Collision-free storage for pairing QR snapshots.
//!
//! Every pairing attempt produces a new QR image. Copies are kept under the
//! QR directory with the driver's file name; when that name is taken, a
//! `_(n)` marker is appended to the stem so an older snapshot is never
//! overwritten.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{RelayError, Result};

static DUPLICATE_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?P<base>.+)_\((?P<n>\d+)\)$").expect("duplicate marker pattern is valid"));

/// A planned or completed QR copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrArtifact {
	pub source_path: PathBuf,
	pub target_path: PathBuf,
	/// Disambiguation number used in `target_path`; `0` when the plain name was free.
	pub sequence_number: u64,
}

/// Returns `initial` if it does not exist, otherwise the first free `stem_(n).ext` sibling.
///
/// Only existence checks are performed. The result can go stale if another
/// process creates the same file before the caller writes it.
pub fn next_available_path(initial: &Path) -> PathBuf {
	next_available(initial).0
}

fn next_available(initial: &Path) -> (PathBuf, u64) {
	if !initial.exists() {
		return (initial.to_path_buf(), 0);
	}

	let parent = initial.parent().unwrap_or_else(|| Path::new(""));
	let stem = initial.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
	let extension = initial.extension().map(|ext| format!(".{}", ext.to_string_lossy())).unwrap_or_default();

	let (base, mut n) = match DUPLICATE_MARKER.captures(&stem) {
		Some(caps) => match caps["n"].parse::<u64>() {
			Ok(n) => (caps["base"].to_string(), n.saturating_add(1)),
			Err(_) => (stem.clone(), 1),
		},
		None => (stem.clone(), 1),
	};

	loop {
		let candidate = parent.join(format!("{base}_({n}){extension}"));
		if !candidate.exists() {
			return (candidate, n);
		}
		n += 1;
	}
}

/// Places pairing QR copies under a fixed directory.
#[derive(Debug, Clone)]
pub struct QrArtifactStore {
	dir: PathBuf,
}

impl QrArtifactStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Computes where a copy of `source` would land, without touching the disk.
	pub fn plan(&self, source: &Path) -> Result<QrArtifact> {
		let file_name = source
			.file_name()
			.ok_or_else(|| RelayError::Context(format!("pairing artifact path has no file name: {}", source.display())))?;
		let (target_path, sequence_number) = next_available(&self.dir.join(file_name));

		Ok(QrArtifact {
			source_path: source.to_path_buf(),
			target_path,
			sequence_number,
		})
	}

	/// Copies `source` into the store under a free name.
	pub fn persist(&self, source: &Path) -> Result<QrArtifact> {
		if !source.exists() {
			return Err(RelayError::Context(format!("pairing artifact not found: {}", source.display())));
		}

		fs::create_dir_all(&self.dir).map_err(|e| RelayError::from_io(&self.dir, "write", e))?;
		let artifact = self.plan(source)?;
		debug!(
			target: "wsr.qr",
			from = %artifact.source_path.display(),
			to = %artifact.target_path.display(),
			"copying pairing QR"
		);
		fs::copy(&artifact.source_path, &artifact.target_path).map_err(|e| RelayError::from_io(&artifact.target_path, "write", e))?;

		info!(target: "wsr.qr", path = %artifact.target_path.display(), "pairing QR saved; scan it with the phone app to log in");
		Ok(artifact)
	}
}
