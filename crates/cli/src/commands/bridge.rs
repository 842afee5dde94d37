use tracing::{info, warn};
use wsr::{BridgeClient, RestBridge, checks};
use wsr_runtime::{BridgeSupervisor, ProcessService};

use super::{identity, shutdown_token};
use crate::config::RelayConfig;
use crate::error::{CliError, Result};

pub async fn run(config: &RelayConfig, register: bool) -> Result<()> {
	checks::pre_launch_checks(&config.paths())?;
	let identity = if register { Some(identity::acquire(config)?) } else { None };
	let cancel = shutdown_token();

	let supervisor = BridgeSupervisor::new(config.bridge.clone());
	supervisor
		.run_scoped(ProcessService::new(config.bridge.clone()), |handle| async move {
			let bridge = RestBridge::new(handle.base_url())?;
			match bridge.about().await {
				Ok(about) => info!(target: "wsr.bridge", versions = ?about.versions, mode = ?about.mode, "bridge answered"),
				Err(err) => warn!(target: "wsr.bridge", error = %err, "bridge version probe failed"),
			}

			if let Some(identity) = identity {
				bridge.register(&identity).await?;
			}

			println!("bridge listening on {}; press Ctrl-C to stop", handle.base_url());
			cancel.cancelled().await;
			Ok::<_, CliError>(())
		})
		.await
}
