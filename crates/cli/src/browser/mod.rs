//! Debugging browser hosting the source chat page.

use std::process::Child;

use tracing::{debug, info};
use wsr::source::{CdpSourceClient, CdpSourceOptions};

use crate::config::RelayConfig;
use crate::error::{CliError, Result};

mod cdp_probe;
mod finder;
mod launcher;

pub use cdp_probe::{CdpVersionInfo, fetch_cdp_endpoint};
pub use finder::find_browser;
pub use launcher::{launch_args, launch_browser};

/// A browser with remote debugging, either found running or launched by us.
///
/// A launched browser is terminated when the session is dropped.
#[derive(Debug)]
pub struct BrowserSession {
	port: u16,
	info: CdpVersionInfo,
	child: Option<Child>,
}

impl BrowserSession {
	/// Reuses a browser already debugging on the configured port, or launches one.
	pub async fn ensure(config: &RelayConfig) -> Result<Self> {
		let port = config.source.cdp_port;
		match fetch_cdp_endpoint(port).await {
			Ok(info) => {
				info!(target: "wsr.browser", port, browser = ?info.browser, "using running browser");
				Ok(Self { port, info, child: None })
			}
			Err(err) if !config.source.launch => Err(CliError::Context(format!("{err}; start the browser with --remote-debugging-port={port}"))),
			Err(_) => {
				let (child, info) = launch_browser(port, &config.browser_profile_dir(), &config.source.url).await?;
				Ok(Self {
					port,
					info,
					child: Some(child),
				})
			}
		}
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	pub fn info(&self) -> &CdpVersionInfo {
		&self.info
	}

	pub fn launched(&self) -> bool {
		self.child.is_some()
	}

	/// Attaches a source client to the chat page.
	pub async fn connect_source(&self, config: &RelayConfig) -> Result<CdpSourceClient> {
		let bootstrap_script = match &config.source.bootstrap_script {
			Some(path) => Some(
				std::fs::read_to_string(path).map_err(|e| CliError::Context(format!("failed to read page script {}: {e}", path.display())))?,
			),
			None => None,
		};

		let options = CdpSourceOptions {
			cdp_port: self.port,
			page_url: config.source.url.clone(),
			pairing_dir: config.paths().pairing_tmp_dir(),
			bootstrap_script,
			reply_timeout: config.reply_timeout(),
		};
		Ok(CdpSourceClient::connect(options).await?)
	}
}

impl Drop for BrowserSession {
	fn drop(&mut self) {
		if let Some(mut child) = self.child.take() {
			debug!(target: "wsr.browser", pid = child.id(), "stopping launched browser");
			if !wsr_runtime::process::request_terminate(child.id()) {
				let _ = child.kill();
			}
			let _ = child.wait();
		}
	}
}
