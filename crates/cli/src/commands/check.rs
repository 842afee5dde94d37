use wsr::{CredentialStore, checks};
use wsr_runtime::process::port_available;

use crate::browser::{fetch_cdp_endpoint, find_browser};
use crate::config::RelayConfig;
use crate::error::Result;

pub async fn run(config: &RelayConfig) -> Result<()> {
	let paths = config.paths();
	checks::pre_launch_checks(&paths)?;
	println!("app dir      {} (writable)", paths.root().display());
	println!("qr dir       {}", paths.qr_dir().display());

	let identity = match CredentialStore::new(paths.credentials_file()).load()? {
		Some(record) if record.validated => "stored".to_string(),
		Some(_) => "stored but invalid".to_string(),
		None => "not stored".to_string(),
	};
	println!("identity     {identity}");

	let bridge = &config.bridge;
	let port_state = if port_available(&bridge.listen_addr, bridge.port) { "free" } else { "in use" };
	println!("bridge       {} ({port_state}), program `{}`", bridge.base_url(), bridge.program);
	if which::which(&bridge.program).is_err() {
		println!("             warning: `{}` not found on PATH", bridge.program);
	}

	let browser = match fetch_cdp_endpoint(config.source.cdp_port).await {
		Ok(info) => format!("debugging on port {} ({})", config.source.cdp_port, info.browser.unwrap_or_default()),
		Err(_) => match find_browser() {
			Some(path) if config.source.launch => format!("will launch {}", path.display()),
			Some(_) => format!("nothing on port {} and launching is disabled", config.source.cdp_port),
			None => "no Chrome/Chromium found".to_string(),
		},
	};
	println!("browser      {browser}");
	Ok(())
}
