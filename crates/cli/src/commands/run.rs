use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wsr::{QrArtifactStore, RelayCursor, RelayLoop, RestBridge, SessionBootstrap, SourceClient, checks, select_chat};
use wsr_runtime::{BridgeServiceHandle, BridgeSupervisor, ProcessService, SupervisorError};

use super::{identity, shutdown_token};
use crate::browser::BrowserSession;
use crate::config::RelayConfig;
use crate::error::{CliError, Result};

/// Checks, identity, then bootstrap and relay inside the supervised bridge scope.
pub async fn run(config: &RelayConfig, retries: u32) -> Result<()> {
	checks::pre_launch_checks(&config.paths())?;
	let identity = identity::acquire(config)?;
	let cancel = shutdown_token();

	let supervisor = BridgeSupervisor::new(config.bridge.clone());
	supervisor
		.run_scoped(ProcessService::new(config.bridge.clone()), |handle| {
			relay_until_cancelled(config, handle, identity, retries, cancel)
		})
		.await
}

async fn relay_until_cancelled(config: &RelayConfig, handle: BridgeServiceHandle, identity: String, retries: u32, cancel: CancellationToken) -> Result<()> {
	let browser = BrowserSession::ensure(config).await?;
	let bridge = RestBridge::new(handle.base_url())?;
	if let Err(err) = bridge.about().await {
		warn!(target: "wsr.bridge", error = %err, "bridge version probe failed; sends will be retried");
	}

	let mut cursor = None;
	let mut attempt = 0;
	loop {
		match relay_session(config, &browser, &handle, bridge.clone(), &identity, &mut cursor, cancel.clone()).await {
			Ok(()) => {
				if let Some(cursor) = &cursor {
					info!(target: "wsr.relay", chat = %cursor.chat().name, forwarded = cursor.forwarded(), "relay finished");
				}
				return Ok(());
			}
			Err(err) if err.is_retryable() && attempt < retries && !cancel.is_cancelled() => {
				attempt += 1;
				let forwarded = cursor.as_ref().map_or(0, RelayCursor::forwarded);
				warn!(target: "wsr.session", attempt, retries, forwarded, error = %err, "bootstrapping source session again");
			}
			Err(err) => return Err(err),
		}
	}
}

/// One bootstrap followed by relaying until cancellation.
///
/// `cursor` carries relay progress between attempts; a cursor for the same
/// chat is resumed so messages confirmed before a lost session are not sent
/// again.
async fn relay_session(
	config: &RelayConfig,
	browser: &BrowserSession,
	handle: &BridgeServiceHandle,
	bridge: RestBridge,
	identity: &str,
	cursor: &mut Option<RelayCursor>,
	cancel: CancellationToken,
) -> Result<()> {
	let client = Arc::new(browser.connect_source(config).await?);
	let mut bootstrap = SessionBootstrap::new(client, QrArtifactStore::new(config.paths().qr_dir()), config.bootstrap_options());

	let session = tokio::select! {
		biased;
		_ = cancel.cancelled() => return Ok(()),
		session = bootstrap.establish() => session?,
	};

	let filter = &config.source.chat_filter;
	let chats = session.client().list_chats().await?;
	let chat = select_chat(&chats, filter).ok_or_else(|| CliError::ChatNotFound(filter.clone()))?;

	let relay = match cursor.take() {
		Some(previous) if previous.chat().id == chat.id => RelayLoop::resume(&session, bridge, identity, previous),
		_ => RelayLoop::new(&session, bridge, identity, chat),
	};
	let mut relay = relay.with_interval(config.relay_interval());

	let outcome = tokio::select! {
		outcome = relay.run(cancel) => outcome.map_err(CliError::from),
		() = handle.exited() => Err(CliError::Service(SupervisorError::Exited("bridge service stopped while relaying".to_string()))),
	};
	*cursor = Some(relay.into_cursor());
	outcome
}
