//! `config.json` in the application directory, overridable from the command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use wsr::credentials::DEFAULT_PROMPT;
use wsr::layout::{CONFIG_FILE, CREDENTIALS_FILE, QR_DIR_NAME};
use wsr::{AppPaths, BootstrapOptions};
use wsr_runtime::BridgeConfig;

use crate::error::{CliError, Result};

pub const DEFAULT_SOURCE_URL: &str = "https://web.whatsapp.com";
pub const DEFAULT_CDP_PORT: u16 = 9222;
pub const DEFAULT_CHAT_FILTER: &str = "RelayTestWapp";

/// Where the source chat page runs and which chat is relayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
	pub url: String,
	pub cdp_port: u16,
	/// Browser profile directory; defaults to `browser-profile` under the app dir.
	pub user_data_dir: Option<PathBuf>,
	/// Substring of the chat name to relay.
	pub chat_filter: String,
	/// Launch a browser when none is listening on `cdp_port`.
	pub launch: bool,
	/// Script injected into the page after attaching (provides `window.WAPI`).
	pub bootstrap_script: Option<PathBuf>,
	/// Limit on a single page evaluation before it counts as failed.
	pub reply_timeout_ms: u64,
}

impl Default for SourceConfig {
	fn default() -> Self {
		Self {
			url: DEFAULT_SOURCE_URL.to_string(),
			cdp_port: DEFAULT_CDP_PORT,
			user_data_dir: None,
			chat_filter: DEFAULT_CHAT_FILTER.to_string(),
			launch: true,
			bootstrap_script: None,
			reply_timeout_ms: 30_000,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
	/// Set from the command line or the home directory; never read from the file.
	#[serde(skip)]
	pub app_dir: PathBuf,
	pub qr_dir_name: String,
	pub credentials_file: String,
	pub login_timeout_secs: u64,
	pub login_poll_interval_ms: u64,
	pub relay_interval_ms: u64,
	pub identity_prompt: String,
	pub bridge: BridgeConfig,
	pub source: SourceConfig,
}

impl Default for RelayConfig {
	fn default() -> Self {
		Self {
			app_dir: PathBuf::new(),
			qr_dir_name: QR_DIR_NAME.to_string(),
			credentials_file: CREDENTIALS_FILE.to_string(),
			login_timeout_secs: 180,
			login_poll_interval_ms: 3_000,
			relay_interval_ms: 2_000,
			identity_prompt: DEFAULT_PROMPT.to_string(),
			bridge: BridgeConfig::default(),
			source: SourceConfig::default(),
		}
	}
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
	pub login_timeout_secs: Option<u64>,
	pub bridge_port: Option<u16>,
	pub cdp_port: Option<u16>,
	pub chat_filter: Option<String>,
	pub no_launch: bool,
}

impl RelayConfig {
	/// Loads `<app_dir>/config.json`, falling back to defaults when it does not exist.
	pub fn load(app_dir: &Path) -> Result<Self> {
		let path = app_dir.join(CONFIG_FILE);
		let mut config = match std::fs::read_to_string(&path) {
			Ok(content) => {
				debug!(target: "wsr.config", path = %path.display(), "loaded config");
				serde_json::from_str(&content).map_err(|source| CliError::Config { path: path.clone(), source })?
			}
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
			Err(err) => return Err(err.into()),
		};
		config.validate(&path)?;
		config.app_dir = app_dir.to_path_buf();
		Ok(config)
	}

	/// Rejects zero intervals, which would turn the polling loops into busy loops.
	fn validate(&self, path: &Path) -> Result<()> {
		let intervals = [
			("login_poll_interval_ms", self.login_poll_interval_ms),
			("relay_interval_ms", self.relay_interval_ms),
			("bridge.ready_poll_ms", self.bridge.ready_poll_ms),
			("source.reply_timeout_ms", self.source.reply_timeout_ms),
		];
		match intervals.into_iter().find(|(_, value)| *value == 0) {
			Some((field, _)) => Err(CliError::InvalidSetting {
				path: path.to_path_buf(),
				field,
			}),
			None => Ok(()),
		}
	}

	/// Resolves the app dir from `explicit` or `$HOME`, then loads the config.
	pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
		let app_dir = match explicit {
			Some(dir) => dir.to_path_buf(),
			None => AppPaths::default_root().ok_or(CliError::NoHomeDir)?,
		};
		Self::load(&app_dir)
	}

	pub fn apply(&mut self, overrides: &Overrides) {
		if let Some(secs) = overrides.login_timeout_secs {
			self.login_timeout_secs = secs;
		}
		if let Some(port) = overrides.bridge_port {
			self.bridge.port = port;
		}
		if let Some(port) = overrides.cdp_port {
			self.source.cdp_port = port;
		}
		if let Some(filter) = &overrides.chat_filter {
			self.source.chat_filter = filter.clone();
		}
		if overrides.no_launch {
			self.source.launch = false;
		}
	}

	pub fn paths(&self) -> AppPaths {
		AppPaths::new(&self.app_dir)
			.with_qr_dir_name(&self.qr_dir_name)
			.with_credentials_file(&self.credentials_file)
	}

	pub fn bootstrap_options(&self) -> BootstrapOptions {
		BootstrapOptions {
			timeout: Duration::from_secs(self.login_timeout_secs),
			poll_interval: Duration::from_millis(self.login_poll_interval_ms),
		}
	}

	pub fn relay_interval(&self) -> Duration {
		Duration::from_millis(self.relay_interval_ms)
	}

	pub fn reply_timeout(&self) -> Duration {
		Duration::from_millis(self.source.reply_timeout_ms)
	}

	pub fn browser_profile_dir(&self) -> PathBuf {
		self.source.user_data_dir.clone().unwrap_or_else(|| self.paths().browser_profile_dir())
	}
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn missing_file_yields_defaults() {
		let tmp = TempDir::new().unwrap();
		let config = RelayConfig::load(tmp.path()).unwrap();
		assert_eq!(config.app_dir, tmp.path());
		assert_eq!(config.bridge.port, 34833);
		assert_eq!(config.bridge.listen_addr, "127.0.0.1");
		assert_eq!(config.bootstrap_options().timeout, Duration::from_secs(180));
		assert_eq!(config.bootstrap_options().poll_interval, Duration::from_secs(3));
		assert_eq!(config.relay_interval(), Duration::from_secs(2));
		assert_eq!(config.paths().qr_dir(), tmp.path().join("qr_codes"));
	}

	#[test]
	fn partial_file_and_overrides_layer_over_defaults() {
		let tmp = TempDir::new().unwrap();
		std::fs::write(
			tmp.path().join(CONFIG_FILE),
			r#"{ "login_timeout_secs": 60, "bridge": { "port": 8080 }, "source": { "chat_filter": "Ops" } }"#,
		)
		.unwrap();

		let mut config = RelayConfig::load(tmp.path()).unwrap();
		assert_eq!(config.login_timeout_secs, 60);
		assert_eq!(config.bridge.port, 8080);
		assert_eq!(config.bridge.startup_timeout_ms, 30_000);
		assert_eq!(config.source.chat_filter, "Ops");
		assert_eq!(config.source.cdp_port, DEFAULT_CDP_PORT);

		config.apply(&Overrides {
			bridge_port: Some(9000),
			no_launch: true,
			..Overrides::default()
		});
		assert_eq!(config.bridge.port, 9000);
		assert_eq!(config.login_timeout_secs, 60);
		assert!(!config.source.launch);
		assert_eq!(config.browser_profile_dir(), tmp.path().join("browser-profile"));
	}

	#[test]
	fn malformed_file_names_the_path() {
		let tmp = TempDir::new().unwrap();
		std::fs::write(tmp.path().join(CONFIG_FILE), "{ nope").unwrap();
		let err = RelayConfig::load(tmp.path()).unwrap_err();
		assert!(err.to_string().contains("config.json"), "{err}");
	}

	#[test]
	fn zero_intervals_are_rejected() {
		let tmp = TempDir::new().unwrap();
		for content in [
			r#"{ "relay_interval_ms": 0 }"#,
			r#"{ "login_poll_interval_ms": 0 }"#,
			r#"{ "bridge": { "ready_poll_ms": 0 } }"#,
		] {
			std::fs::write(tmp.path().join(CONFIG_FILE), content).unwrap();
			let err = RelayConfig::load(tmp.path()).unwrap_err();
			assert!(matches!(err, CliError::InvalidSetting { .. }), "{content}: {err}");
			assert!(err.to_string().contains("must be greater than zero"), "{err}");
		}

		std::fs::write(tmp.path().join(CONFIG_FILE), r#"{ "relay_interval_ms": 1 }"#).unwrap();
		assert_eq!(RelayConfig::load(tmp.path()).unwrap().relay_interval(), Duration::from_millis(1));
	}
}
