//! Launching a browser with remote debugging enabled.

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tracing::{debug, info};

use super::cdp_probe::{CdpVersionInfo, fetch_cdp_endpoint};
use super::finder::find_browser;
use crate::error::{CliError, Result};

const LAUNCH_ATTEMPTS: usize = 25;
const LAUNCH_POLL: Duration = Duration::from_millis(200);

/// Command-line flags for a debugging browser showing `url`.
pub fn launch_args(port: u16, user_data_dir: &Path, url: &str) -> Vec<String> {
	vec![
		format!("--remote-debugging-port={port}"),
		format!("--user-data-dir={}", user_data_dir.display()),
		"--no-first-run".to_string(),
		"--no-default-browser-check".to_string(),
		url.to_string(),
	]
}

/// Starts a browser and waits for its DevTools endpoint.
pub async fn launch_browser(port: u16, user_data_dir: &Path, url: &str) -> Result<(Child, CdpVersionInfo)> {
	let executable = find_browser().ok_or_else(|| {
		CliError::Context("no Chrome/Chromium executable found; install one or start it with --remote-debugging-port".to_string())
	})?;
	std::fs::create_dir_all(user_data_dir)?;

	let mut command = Command::new(&executable);
	command
		.args(launch_args(port, user_data_dir, url))
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null());
	#[cfg(unix)]
	std::os::unix::process::CommandExt::process_group(&mut command, 0);

	let mut child = command
		.spawn()
		.map_err(|e| CliError::Context(format!("failed to launch {}: {e}", executable.display())))?;
	debug!(target: "wsr.browser", pid = child.id(), executable = %executable.display(), "browser spawned");

	let mut last_error = String::from("endpoint not reachable");
	for _ in 0..LAUNCH_ATTEMPTS {
		tokio::time::sleep(LAUNCH_POLL).await;

		if let Some(status) = child.try_wait()? {
			return Err(CliError::Context(format!(
				"browser exited before its debugging endpoint came up ({status}); is another instance using {}?",
				user_data_dir.display()
			)));
		}

		match fetch_cdp_endpoint(port).await {
			Ok(info) => {
				info!(target: "wsr.browser", port, browser = ?info.browser, "browser ready");
				return Ok((child, info));
			}
			Err(err) => last_error = err.to_string(),
		}
	}

	let _ = child.kill();
	Err(CliError::Context(format!("browser debugging endpoint not available on port {port}: {last_error}")))
}
