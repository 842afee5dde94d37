//! Bridge service configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 34833;
pub const DEFAULT_PROGRAM: &str = "signal-cli-rest-api";

/// How the local REST bridge is launched and supervised.
///
/// `args` and `env` values may contain `{addr}`, `{host}` and `{port}`
/// placeholders which are filled from `listen_addr`/`port` at spawn time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
	pub listen_addr: String,
	pub port: u16,
	pub program: String,
	pub args: Vec<String>,
	pub env: BTreeMap<String, String>,
	pub startup_timeout_ms: u64,
	pub ready_poll_ms: u64,
	pub shutdown_grace_ms: u64,
}

impl Default for BridgeConfig {
	fn default() -> Self {
		Self {
			listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
			port: DEFAULT_PORT,
			program: DEFAULT_PROGRAM.to_string(),
			args: Vec::new(),
			env: BTreeMap::from([("PORT".to_string(), "{port}".to_string())]),
			startup_timeout_ms: 30_000,
			ready_poll_ms: 1,
			shutdown_grace_ms: 5_000,
		}
	}
}

impl BridgeConfig {
	pub fn base_url(&self) -> String {
		format!("http://{}:{}", self.listen_addr, self.port)
	}

	pub fn startup_timeout(&self) -> Duration {
		Duration::from_millis(self.startup_timeout_ms)
	}

	pub fn ready_poll_interval(&self) -> Duration {
		Duration::from_millis(self.ready_poll_ms.max(1))
	}

	pub fn shutdown_grace(&self) -> Duration {
		Duration::from_millis(self.shutdown_grace_ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn partial_json_keeps_defaults() {
		let config: BridgeConfig = serde_json::from_str(r#"{ "port": 8080 }"#).unwrap();
		assert_eq!(config.port, 8080);
		assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
		assert_eq!(config.base_url(), "http://127.0.0.1:8080");
		assert_eq!(config.ready_poll_interval(), Duration::from_millis(1));
	}
}
