//! Scoped supervision of the background bridge service.
//!
//! [`BridgeSupervisor::run_scoped`] starts a [`BackgroundService`] on its own
//! thread, waits (bounded by [`BridgeConfig::startup_timeout`]) until the
//! service raises its `started` flag, runs the caller's body, and then asks the
//! service to exit and joins its thread. The join also happens when the body
//! fails or when the whole future is dropped, through [`ScopedBridge`]'s
//! `Drop`.
//!
//! Process-wide signal handling is left to the binary embedding the supervisor.

use std::future::Future;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::error::SupervisorError;
use crate::service::{BackgroundService, ServiceFlags};

const EXIT_WATCH_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle of a supervised service as seen by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
	Stopped,
	Starting,
	Ready,
	Stopping,
}

#[derive(Debug)]
struct HandleState {
	status: Mutex<ServiceStatus>,
	flags: Arc<ServiceFlags>,
	base_url: String,
}

/// Cloneable view of a supervised service handed to the scope body.
#[derive(Debug, Clone)]
pub struct BridgeServiceHandle {
	inner: Arc<HandleState>,
}

impl BridgeServiceHandle {
	fn new(flags: Arc<ServiceFlags>, base_url: String) -> Self {
		Self {
			inner: Arc::new(HandleState {
				status: Mutex::new(ServiceStatus::Stopped),
				flags,
				base_url,
			}),
		}
	}

	pub fn status(&self) -> ServiceStatus {
		*self.inner.status.lock()
	}

	/// Readiness flag as raised by the service thread.
	pub fn is_ready(&self) -> bool {
		self.inner.flags.is_started()
	}

	pub fn exit_requested(&self) -> bool {
		self.inner.flags.exit_requested()
	}

	/// True once the service thread has returned, whether asked to or not.
	pub fn has_exited(&self) -> bool {
		self.inner.flags.is_finished()
	}

	/// Resolves when the service thread ends without an exit request.
	///
	/// Stays pending once shutdown was requested, so it can be raced
	/// against the scope body.
	pub async fn exited(&self) {
		loop {
			if self.has_exited() && !self.exit_requested() {
				return;
			}
			tokio::time::sleep(EXIT_WATCH_INTERVAL).await;
		}
	}

	/// Base URL of the bridge's HTTP listener.
	pub fn base_url(&self) -> &str {
		&self.inner.base_url
	}

	fn set_status(&self, status: ServiceStatus) {
		*self.inner.status.lock() = status;
	}
}

type ServiceThread = JoinHandle<Result<(), SupervisorError>>;

/// Owns a running service; stops and joins it on [`shutdown`](Self::shutdown) or drop.
#[derive(Debug)]
pub struct ScopedBridge {
	handle: BridgeServiceHandle,
	thread: Option<ServiceThread>,
}

impl ScopedBridge {
	pub fn handle(&self) -> &BridgeServiceHandle {
		&self.handle
	}

	/// Requests exit and waits for the service thread to finish.
	///
	/// Returns the service's own error if it failed while running.
	pub async fn shutdown(mut self) -> Result<(), SupervisorError> {
		let Some(thread) = self.thread.take() else {
			return Ok(());
		};

		self.handle.set_status(ServiceStatus::Stopping);
		self.handle.inner.flags.request_exit();
		debug!(target: "wsr.bridge", "waiting for bridge service to stop");

		let joined = tokio::task::spawn_blocking(move || thread.join()).await;
		self.handle.set_status(ServiceStatus::Stopped);

		match joined {
			Ok(Ok(result)) => {
				info!(target: "wsr.bridge", "bridge service stopped");
				result
			}
			Ok(Err(_)) | Err(_) => Err(SupervisorError::Panicked),
		}
	}

	fn stop_blocking(&mut self) -> Option<Result<(), SupervisorError>> {
		let thread = self.thread.take()?;
		self.handle.set_status(ServiceStatus::Stopping);
		self.handle.inner.flags.request_exit();
		let result = thread.join().unwrap_or(Err(SupervisorError::Panicked));
		self.handle.set_status(ServiceStatus::Stopped);
		Some(result)
	}

	fn finished(&self) -> bool {
		self.thread.as_ref().is_none_or(JoinHandle::is_finished)
	}
}

impl Drop for ScopedBridge {
	fn drop(&mut self) {
		if self.thread.is_some() {
			warn!(target: "wsr.bridge", "bridge scope released without shutdown; stopping service");
			if let Some(Err(err)) = self.stop_blocking() {
				warn!(target: "wsr.bridge", error = %err, "bridge service failed while stopping");
			}
		}
	}
}

/// Starts services and guarantees they are stopped when their scope ends.
#[derive(Debug, Clone)]
pub struct BridgeSupervisor {
	config: BridgeConfig,
}

impl BridgeSupervisor {
	pub fn new(config: BridgeConfig) -> Self {
		Self { config }
	}

	pub fn config(&self) -> &BridgeConfig {
		&self.config
	}

	/// Spawns `service` and returns once its readiness flag is observed.
	///
	/// # Errors
	///
	/// Returns [`SupervisorError::StartupFailed`] when the service thread ends
	/// before signalling readiness, and [`SupervisorError::StartupTimeout`] when
	/// readiness is not observed within the configured limit. In both cases the
	/// thread has been joined before the error is returned.
	pub async fn start<S: BackgroundService>(&self, service: S) -> Result<ScopedBridge, SupervisorError> {
		let flags = Arc::new(ServiceFlags::default());
		let handle = BridgeServiceHandle::new(Arc::clone(&flags), self.config.base_url());
		handle.set_status(ServiceStatus::Starting);

		let name = service.name().to_string();
		let thread_flags = Arc::clone(&flags);
		let thread = std::thread::Builder::new()
			.name(format!("wsr-{name}"))
			.spawn(move || {
				let result = service.run(&thread_flags);
				thread_flags.mark_finished();
				result
			})?;

		let mut scope = ScopedBridge {
			handle,
			thread: Some(thread),
		};

		let limit = self.config.startup_timeout();
		let poll = self.config.ready_poll_interval();
		let started = Instant::now();
		debug!(target: "wsr.bridge", service = %name, limit_ms = limit.as_millis() as u64, "waiting for service readiness");

		while !flags.is_started() {
			if scope.finished() {
				let reason = match scope.stop_blocking() {
					Some(Err(err)) => err.to_string(),
					_ => format!("{name} exited before signalling readiness"),
				};
				return Err(SupervisorError::StartupFailed(reason));
			}

			let waited = started.elapsed();
			if waited >= limit {
				scope.stop_blocking();
				return Err(SupervisorError::StartupTimeout { waited, limit });
			}

			tokio::time::sleep(poll).await;
		}

		scope.handle.set_status(ServiceStatus::Ready);
		info!(
			target: "wsr.bridge",
			service = %name,
			url = %scope.handle.base_url(),
			ready_ms = started.elapsed().as_millis() as u64,
			"service ready"
		);
		Ok(scope)
	}

	/// Runs `body` while `service` is up, stopping the service on every exit path.
	///
	/// The body's error wins over a shutdown error; a shutdown error after a
	/// successful body is returned as the scope's result.
	pub async fn run_scoped<S, F, Fut, T, E>(&self, service: S, body: F) -> Result<T, E>
	where
		S: BackgroundService,
		F: FnOnce(BridgeServiceHandle) -> Fut,
		Fut: Future<Output = Result<T, E>>,
		E: From<SupervisorError>,
	{
		let scope = self.start(service).await?;
		let outcome = body(scope.handle().clone()).await;
		let stopped = scope.shutdown().await;

		match (outcome, stopped) {
			(Ok(value), Ok(())) => Ok(value),
			(Ok(_), Err(err)) => Err(err.into()),
			(Err(err), stop_result) => {
				if let Err(stop_err) = stop_result {
					warn!(target: "wsr.bridge", error = %stop_err, "bridge service failed while stopping");
				}
				Err(err)
			}
		}
	}
}
