//! Operator identity (target-platform phone number) persistence.
//!
//! The identity lives in a small YAML file under a single key. A stored value
//! is only handed out after it passes [`validate_identity`]; anything else
//! (missing file, missing key, corrupt YAML, malformed number) sends the
//! operator back to the prompt.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};

/// YAML key holding the identity.
pub const IDENTITY_KEY: &str = "SIGNAL_ID";

/// Prompt input that aborts identity entry.
pub const EXIT_SENTINEL: &str = "exit";

pub const DEFAULT_PROMPT: &str = "Input Signal ID (phone number WITH country prefix): ";

static IDENTITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?:\+|00)?\d{10,14}$").expect("identity pattern is valid"));

/// Checks `candidate` against the phone-number pattern: an optional `+` or
/// `00` prefix followed by 10 to 14 digits.
pub fn validate_identity(candidate: &str) -> Result<&str> {
	if IDENTITY_PATTERN.is_match(candidate) {
		Ok(candidate)
	} else if candidate.is_empty() {
		Err(RelayError::Validation("identity is empty".to_string()))
	} else {
		Err(RelayError::Validation(format!(
			"{candidate:?} is not a phone number with country prefix (expected + or 00 followed by 10-14 digits)"
		)))
	}
}

/// Source of interactively entered identities.
pub trait IdentityPrompt {
	/// Reads one entry without echoing it. `Ok(None)` means input is closed.
	fn read_identity(&mut self, prompt: &str) -> std::io::Result<Option<String>>;

	/// Tells the operator why the last entry was refused.
	fn reject(&mut self, message: &str);
}

/// Identity as read from or written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
	pub identity: String,
	pub validated: bool,
}

/// File-backed identity store with an in-memory cache.
#[derive(Debug, Clone)]
pub struct CredentialStore {
	path: PathBuf,
	prompt_text: String,
	cached: Option<CredentialRecord>,
}

impl CredentialStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			prompt_text: DEFAULT_PROMPT.to_string(),
			cached: None,
		}
	}

	pub fn with_prompt_text(mut self, text: impl Into<String>) -> Self {
		self.prompt_text = text.into();
		self
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Reads the persisted record, if any.
	///
	/// A file that cannot be parsed, lacks the key, or holds a non-scalar
	/// value yields `Ok(None)`. A present but malformed identity is returned
	/// with `validated == false`.
	pub fn load(&self) -> Result<Option<CredentialRecord>> {
		let content = match fs::read_to_string(&self.path) {
			Ok(content) => content,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(err) => return Err(RelayError::from_io(&self.path, "read", err)),
		};

		let document: Value = match serde_yaml::from_str(&content) {
			Ok(value) => value,
			Err(err) => {
				debug!(target: "wsr.credentials", path = %self.path.display(), error = %err, "credentials file is corrupt");
				return Ok(None);
			}
		};

		let identity = match document.get(IDENTITY_KEY) {
			Some(Value::String(text)) => text.trim().to_string(),
			Some(Value::Number(number)) => number.to_string(),
			_ => {
				debug!(target: "wsr.credentials", path = %self.path.display(), key = IDENTITY_KEY, "identity key missing");
				return Ok(None);
			}
		};

		let validated = validate_identity(&identity).is_ok();
		Ok(Some(CredentialRecord { identity, validated }))
	}

	/// Returns the stored identity, prompting for a new one when it is
	/// missing or invalid.
	///
	/// # Errors
	///
	/// [`RelayError::IdentityEntryAborted`] when the operator enters
	/// [`EXIT_SENTINEL`] or input closes, [`RelayError::Permission`] when the
	/// record cannot be written.
	pub fn get_identity(&mut self, prompt: &mut dyn IdentityPrompt) -> Result<String> {
		if let Some(record) = self.cached.as_ref().filter(|r| r.validated) {
			return Ok(record.identity.clone());
		}

		match self.load()? {
			Some(record) if record.validated => {
				debug!(target: "wsr.credentials", "using stored identity");
				let identity = record.identity.clone();
				self.cached = Some(record);
				return Ok(identity);
			}
			Some(_) => warn!(target: "wsr.credentials", path = %self.path.display(), "stored identity is malformed; asking for a new one"),
			None => info!(target: "wsr.credentials", path = %self.path.display(), "no stored identity; asking operator"),
		}

		let identity = self.prompt_until_valid(prompt)?;
		self.persist(&identity)?;
		self.cached = Some(CredentialRecord {
			identity: identity.clone(),
			validated: true,
		});
		Ok(identity)
	}

	/// Drops the cached record so the next lookup rereads the file.
	pub fn invalidate(&mut self) {
		self.cached = None;
	}

	/// Removes the persisted record. Returns whether a file was removed.
	pub fn clear(&mut self) -> Result<bool> {
		self.invalidate();
		match fs::remove_file(&self.path) {
			Ok(()) => Ok(true),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
			Err(err) => Err(RelayError::from_io(&self.path, "write", err)),
		}
	}

	fn prompt_until_valid(&self, prompt: &mut dyn IdentityPrompt) -> Result<String> {
		loop {
			let Some(entry) = prompt.read_identity(&self.prompt_text)? else {
				return Err(RelayError::IdentityEntryAborted);
			};
			let entry = entry.trim();

			if entry == EXIT_SENTINEL {
				debug!(target: "wsr.credentials", "operator requested exit");
				return Err(RelayError::IdentityEntryAborted);
			}

			match validate_identity(entry) {
				Ok(identity) => return Ok(identity.to_string()),
				Err(err) => prompt.reject(&format!("{err}. Try again, or type '{EXIT_SENTINEL}' to exit.")),
			}
		}
	}

	fn persist(&self, identity: &str) -> Result<()> {
		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| RelayError::from_io(parent, "write", e))?;
		}

		let mut document = Mapping::new();
		document.insert(Value::String(IDENTITY_KEY.to_string()), Value::String(identity.to_string()));
		let yaml = serde_yaml::to_string(&document)?;
		fs::write(&self.path, yaml).map_err(|e| RelayError::from_io(&self.path, "write", e))?;

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)).map_err(|e| RelayError::from_io(&self.path, "write", e))?;
		}

		info!(target: "wsr.credentials", path = %self.path.display(), "identity saved");
		Ok(())
	}
}
