//! DevTools endpoint probing.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{CliError, Result};

/// `/json/version` response subset.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpVersionInfo {
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: String,
	#[serde(rename = "Browser")]
	pub browser: Option<String>,
}

/// Fetches `/json/version` from a browser debugging on `port`.
pub async fn fetch_cdp_endpoint(port: u16) -> Result<CdpVersionInfo> {
	let client = reqwest::Client::builder().timeout(Duration::from_millis(400)).build()?;
	let mut last_error = "no response".to_string();

	for host in ["127.0.0.1", "localhost", "[::1]"] {
		let url = format!("http://{host}:{port}/json/version");
		let response = match client.get(&url).send().await {
			Ok(response) => response,
			Err(err) => {
				last_error = err.to_string();
				continue;
			}
		};

		if !response.status().is_success() {
			last_error = format!("unexpected status {}", response.status());
			continue;
		}
		return Ok(response.json().await?);
	}

	Err(CliError::Context(format!("no debugging browser on port {port}: {last_error}")))
}
