mod bridge;
mod check;
pub mod identity;
mod login;
mod run;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::Commands;
use crate::config::RelayConfig;
use crate::error::Result;

pub async fn dispatch(command: Commands, config: RelayConfig) -> Result<()> {
	match command {
		Commands::Run { retries, .. } => run::run(&config, retries).await?,
		Commands::Login => login::run(&config).await?,
		Commands::Bridge { register } => bridge::run(&config, register).await?,
		Commands::Identity { action } => identity::run(&config, action)?,
		Commands::Check => check::run(&config).await?,
	}

	Ok(())
}

/// Token cancelled on the first Ctrl-C.
pub(crate) fn shutdown_token() -> CancellationToken {
	let token = CancellationToken::new();
	let trigger = token.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			info!(target: "wsr", "interrupt received; shutting down");
			trigger.cancel();
		}
	});
	token
}
