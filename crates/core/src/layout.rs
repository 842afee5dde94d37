//! On-disk layout of the relay's application directory.

use std::path::{Path, PathBuf};

pub const APP_DIR_NAME: &str = ".wapp-signal-relay";
pub const QR_DIR_NAME: &str = "qr_codes";
pub const CREDENTIALS_FILE: &str = "credentials.yaml";
pub const CONFIG_FILE: &str = "config.json";
pub const LOG_FILE: &str = "wapp-signal-relay.log";
pub const BROWSER_PROFILE_DIR: &str = "browser-profile";
pub const PAIRING_TMP_DIR: &str = "pairing-tmp";

/// Resolved paths under the application directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
	root: PathBuf,
	qr_dir_name: String,
	credentials_file: String,
}

impl AppPaths {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			qr_dir_name: QR_DIR_NAME.to_string(),
			credentials_file: CREDENTIALS_FILE.to_string(),
		}
	}

	/// `$HOME/.wapp-signal-relay`, when a home directory is known.
	pub fn default_root() -> Option<PathBuf> {
		dirs::home_dir().map(|home| home.join(APP_DIR_NAME))
	}

	pub fn with_qr_dir_name(mut self, name: impl Into<String>) -> Self {
		self.qr_dir_name = name.into();
		self
	}

	pub fn with_credentials_file(mut self, name: impl Into<String>) -> Self {
		self.credentials_file = name.into();
		self
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn qr_dir(&self) -> PathBuf {
		self.root.join(&self.qr_dir_name)
	}

	pub fn credentials_file(&self) -> PathBuf {
		self.root.join(&self.credentials_file)
	}

	pub fn credentials_file_name(&self) -> &str {
		&self.credentials_file
	}

	pub fn config_file(&self) -> PathBuf {
		self.root.join(CONFIG_FILE)
	}

	pub fn log_file(&self) -> PathBuf {
		self.root.join(LOG_FILE)
	}

	pub fn browser_profile_dir(&self) -> PathBuf {
		self.root.join(BROWSER_PROFILE_DIR)
	}

	/// Scratch directory the source client writes pairing images to.
	pub fn pairing_tmp_dir(&self) -> PathBuf {
		self.root.join(PAIRING_TMP_DIR)
	}
}
