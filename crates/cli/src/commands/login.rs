use std::sync::Arc;

use wsr::{QrArtifactStore, SessionBootstrap, checks};

use super::shutdown_token;
use crate::browser::BrowserSession;
use crate::config::RelayConfig;
use crate::error::Result;

pub async fn run(config: &RelayConfig) -> Result<()> {
	let paths = config.paths();
	checks::pre_launch_checks(&paths)?;

	let browser = BrowserSession::ensure(config).await?;
	let client = Arc::new(browser.connect_source(config).await?);
	let mut bootstrap = SessionBootstrap::new(client, QrArtifactStore::new(paths.qr_dir()), config.bootstrap_options());

	let cancel = shutdown_token();
	let session = tokio::select! {
		biased;
		_ = cancel.cancelled() => {
			println!("login cancelled");
			return Ok(());
		}
		session = bootstrap.establish() => session?,
	};

	match session.artifact() {
		Some(artifact) => println!(
			"logged in after {}s; pairing QR kept at {}",
			session.established_in().as_secs(),
			artifact.target_path.display()
		),
		None => println!("already logged in"),
	}
	if browser.launched() {
		println!("the browser profile in {} keeps the session for `wsr run`", config.browser_profile_dir().display());
	}
	Ok(())
}
