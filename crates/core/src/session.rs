//! Source-platform login bootstrap.
//!
//! [`SessionBootstrap::establish`] walks `Init -> AwaitingQr -> PollingLogin ->
//! LoggedIn`, persisting the pairing QR on the way, and gives up with
//! [`RelayError::Timeout`] once the wall-clock budget is spent. Waiting happens
//! at async sleep points only, so the bootstrap shares its runtime with the
//! rest of the relay.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};
use crate::qr::{QrArtifact, QrArtifactStore};
use crate::source::SourceClient;

pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(180);
pub const DEFAULT_LOGIN_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Bootstrap progress. Ordered: transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
	Init,
	AwaitingQr,
	PollingLogin,
	LoggedIn,
	TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapOptions {
	pub timeout: Duration,
	pub poll_interval: Duration,
}

impl Default for BootstrapOptions {
	fn default() -> Self {
		Self {
			timeout: DEFAULT_LOGIN_TIMEOUT,
			poll_interval: DEFAULT_LOGIN_POLL_INTERVAL,
		}
	}
}

/// A logged-in source session.
#[derive(Debug)]
pub struct SessionHandle<C> {
	client: Arc<C>,
	started_at: Instant,
	established_in: Duration,
	artifact: Option<QrArtifact>,
}

impl<C> Clone for SessionHandle<C> {
	fn clone(&self) -> Self {
		Self {
			client: Arc::clone(&self.client),
			started_at: self.started_at,
			established_in: self.established_in,
			artifact: self.artifact.clone(),
		}
	}
}

impl<C: SourceClient> SessionHandle<C> {
	pub fn client(&self) -> &Arc<C> {
		&self.client
	}

	pub fn started_at(&self) -> Instant {
		self.started_at
	}

	/// Time from bootstrap start until login was observed.
	pub fn established_in(&self) -> Duration {
		self.established_in
	}

	/// The persisted pairing QR, when one was shown.
	pub fn artifact(&self) -> Option<&QrArtifact> {
		self.artifact.as_ref()
	}
}

/// Drives a [`SourceClient`] to a logged-in session.
pub struct SessionBootstrap<C> {
	client: Arc<C>,
	qr_store: QrArtifactStore,
	options: BootstrapOptions,
	state: SessionState,
}

impl<C: SourceClient> SessionBootstrap<C> {
	pub fn new(client: Arc<C>, qr_store: QrArtifactStore, options: BootstrapOptions) -> Self {
		Self {
			client,
			qr_store,
			options,
			state: SessionState::Init,
		}
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	/// Returns to `Init` so [`establish`](Self::establish) may run again.
	pub fn reset(&mut self) {
		debug!(target: "wsr.session", from = ?self.state, "bootstrap reset");
		self.state = SessionState::Init;
	}

	/// Logs in, or fails with [`RelayError::Timeout`] after `options.timeout`.
	///
	/// Client errors while waiting are logged and retried until the deadline.
	/// A timed-out bootstrap stays in `TimedOut` until [`reset`](Self::reset).
	pub async fn establish(&mut self) -> Result<SessionHandle<C>> {
		if self.state != SessionState::Init {
			return Err(RelayError::Context(format!("bootstrap is in state {:?}; reset it before retrying", self.state)));
		}

		let started_at = Instant::now();
		self.transition(SessionState::AwaitingQr);
		let artifact = self.await_pairing(started_at).await?;

		self.transition(SessionState::PollingLogin);
		loop {
			let elapsed = self.check_deadline(started_at)?;
			info!(
				target: "wsr.session",
				elapsed_secs = elapsed.as_secs(),
				timeout_secs = self.options.timeout.as_secs(),
				"waiting for source login to complete"
			);

			match self.client.is_logged_in().await {
				Ok(true) => break,
				Ok(false) => {}
				Err(err) => warn!(target: "wsr.session", error = %err, "login check failed; retrying"),
			}

			self.sleep_within_budget(started_at).await;
		}

		self.transition(SessionState::LoggedIn);
		let established_in = started_at.elapsed();
		info!(target: "wsr.session", secs = established_in.as_secs(), "logged into source platform");

		Ok(SessionHandle {
			client: Arc::clone(&self.client),
			started_at,
			established_in,
			artifact,
		})
	}

	/// Persists a pairing QR, or skips it when the session is already logged in.
	async fn await_pairing(&mut self, started_at: Instant) -> Result<Option<QrArtifact>> {
		loop {
			self.check_deadline(started_at)?;

			match self.client.request_pairing_artifact().await {
				Ok(path) => return self.qr_store.persist(&path).map(Some),
				Err(err) => {
					if matches!(self.client.is_logged_in().await, Ok(true)) {
						debug!(target: "wsr.session", "already logged in; no pairing QR needed");
						return Ok(None);
					}
					debug!(target: "wsr.session", error = %err, "pairing QR not available yet");
				}
			}

			self.sleep_within_budget(started_at).await;
		}
	}

	fn check_deadline(&mut self, started_at: Instant) -> Result<Duration> {
		let elapsed = started_at.elapsed();
		if elapsed >= self.options.timeout {
			self.transition(SessionState::TimedOut);
			warn!(
				target: "wsr.session",
				elapsed_secs = elapsed.as_secs(),
				timeout_secs = self.options.timeout.as_secs(),
				"source login timed out"
			);
			return Err(RelayError::Timeout {
				elapsed,
				timeout: self.options.timeout,
			});
		}
		Ok(elapsed)
	}

	async fn sleep_within_budget(&self, started_at: Instant) {
		let remaining = self.options.timeout.saturating_sub(started_at.elapsed());
		tokio::time::sleep(self.options.poll_interval.min(remaining)).await;
	}

	fn transition(&mut self, next: SessionState) {
		debug_assert!(next > self.state, "session state must move forward: {:?} -> {next:?}", self.state);
		debug!(target: "wsr.session", from = ?self.state, to = ?next, "session state");
		self.state = next;
	}
}

#[cfg(test)]
mod tests {
	use std::path::PathBuf;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use async_trait::async_trait;
	use tempfile::TempDir;

	use super::*;
	use crate::source::{ChatRef, SourceMessage};

	#[derive(Debug)]
	struct FakeSource {
		qr: Option<PathBuf>,
		logged_in_after_checks: Option<usize>,
		checks: AtomicUsize,
	}

	#[async_trait]
	impl SourceClient for FakeSource {
		async fn request_pairing_artifact(&self) -> Result<PathBuf> {
			self.qr.clone().ok_or_else(|| RelayError::Cdp("no QR".to_string()))
		}

		async fn is_logged_in(&self) -> Result<bool> {
			let n = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
			Ok(self.logged_in_after_checks.is_some_and(|after| n >= after))
		}

		async fn list_chats(&self) -> Result<Vec<ChatRef>> {
			Ok(Vec::new())
		}

		async fn fetch_unread(&self, _chat: &ChatRef) -> Result<Vec<SourceMessage>> {
			Ok(Vec::new())
		}
	}

	fn qr_source(tmp: &TempDir) -> PathBuf {
		let path = tmp.path().join("driver-qr.png");
		std::fs::write(&path, b"qr").unwrap();
		path
	}

	fn options(timeout_secs: u64) -> BootstrapOptions {
		BootstrapOptions {
			timeout: Duration::from_secs(timeout_secs),
			poll_interval: Duration::from_secs(3),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn never_logged_in_times_out_no_earlier_than_timeout() {
		let tmp = TempDir::new().unwrap();
		let client = Arc::new(FakeSource {
			qr: Some(qr_source(&tmp)),
			logged_in_after_checks: None,
			checks: AtomicUsize::new(0),
		});
		let mut bootstrap = SessionBootstrap::new(Arc::clone(&client), QrArtifactStore::new(tmp.path().join("qr")), options(5));

		let start = Instant::now();
		let err = bootstrap.establish().await.unwrap_err();
		let waited = start.elapsed();

		assert!(matches!(err, RelayError::Timeout { timeout, .. } if timeout == Duration::from_secs(5)));
		assert!(waited >= Duration::from_secs(5), "gave up after {waited:?}");
		assert!(waited < Duration::from_secs(8), "overshot: {waited:?}");
		assert_eq!(bootstrap.state(), SessionState::TimedOut);
		assert_eq!(client.checks.load(Ordering::SeqCst), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn login_after_qr_scan_returns_handle() {
		let tmp = TempDir::new().unwrap();
		let client = Arc::new(FakeSource {
			qr: Some(qr_source(&tmp)),
			logged_in_after_checks: Some(3),
			checks: AtomicUsize::new(0),
		});
		let mut bootstrap = SessionBootstrap::new(client, QrArtifactStore::new(tmp.path().join("qr")), options(180));

		let handle = bootstrap.establish().await.unwrap();

		assert_eq!(bootstrap.state(), SessionState::LoggedIn);
		assert_eq!(handle.established_in(), Duration::from_secs(6));
		let artifact = handle.artifact().unwrap();
		assert_eq!(artifact.target_path, tmp.path().join("qr").join("driver-qr.png"));
		assert!(artifact.target_path.exists());
	}

	#[tokio::test(start_paused = true)]
	async fn already_logged_in_skips_pairing_artifact() {
		let tmp = TempDir::new().unwrap();
		let client = Arc::new(FakeSource {
			qr: None,
			logged_in_after_checks: Some(1),
			checks: AtomicUsize::new(0),
		});
		let mut bootstrap = SessionBootstrap::new(client, QrArtifactStore::new(tmp.path().join("qr")), options(10));

		let handle = bootstrap.establish().await.unwrap();
		assert!(handle.artifact().is_none());
		assert_eq!(handle.established_in(), Duration::ZERO);
	}

	#[tokio::test(start_paused = true)]
	async fn timed_out_bootstrap_requires_reset() {
		let tmp = TempDir::new().unwrap();
		let client = Arc::new(FakeSource {
			qr: None,
			logged_in_after_checks: None,
			checks: AtomicUsize::new(0),
		});
		let mut bootstrap = SessionBootstrap::new(client, QrArtifactStore::new(tmp.path().join("qr")), options(1));

		assert!(matches!(bootstrap.establish().await, Err(RelayError::Timeout { .. })));
		assert!(matches!(bootstrap.establish().await, Err(RelayError::Context(_))));

		bootstrap.reset();
		assert_eq!(bootstrap.state(), SessionState::Init);
		assert!(matches!(bootstrap.establish().await, Err(RelayError::Timeout { .. })));
	}
}
