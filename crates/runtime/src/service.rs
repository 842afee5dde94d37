//! Background execution units hosted by the supervisor.
//!
//! A [`BackgroundService`] runs on its own OS thread, independent of the async
//! scheduler driving the rest of the relay. It talks to the supervisor only
//! through [`ServiceFlags`]: it raises `started` once it is serving and polls
//! `should_exit` from its own loop.

use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::error::SupervisorError;
use crate::process::{expand_args, expand_placeholders, port_accepting, port_available, request_terminate};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);
const READY_PROBE_TIMEOUT: Duration = Duration::from_millis(100);

/// Readiness/exit signalling shared between the supervisor and a service thread.
#[derive(Debug, Default)]
pub struct ServiceFlags {
	started: AtomicBool,
	should_exit: AtomicBool,
	finished: AtomicBool,
}

impl ServiceFlags {
	pub fn mark_started(&self) {
		self.started.store(true, Ordering::Release);
	}

	pub fn is_started(&self) -> bool {
		self.started.load(Ordering::Acquire)
	}

	pub fn request_exit(&self) {
		self.should_exit.store(true, Ordering::Release);
	}

	pub fn exit_requested(&self) -> bool {
		self.should_exit.load(Ordering::Acquire)
	}

	/// Raised by the supervisor's thread wrapper once [`BackgroundService::run`] returned.
	pub fn mark_finished(&self) {
		self.finished.store(true, Ordering::Release);
	}

	pub fn is_finished(&self) -> bool {
		self.finished.load(Ordering::Acquire)
	}
}

/// Entry point of a service run on a dedicated thread.
pub trait BackgroundService: Send + 'static {
	/// Short name used for the thread name and log fields.
	fn name(&self) -> &str;

	/// Runs until [`ServiceFlags::exit_requested`] turns true.
	///
	/// Implementations call [`ServiceFlags::mark_started`] once they accept
	/// requests and must check the exit flag at least every few milliseconds.
	fn run(self, flags: &ServiceFlags) -> Result<(), SupervisorError>;
}

/// Runs the REST bridge as a child process and tracks it from a service thread.
#[derive(Debug, Clone)]
pub struct ProcessService {
	config: BridgeConfig,
}

impl ProcessService {
	pub fn new(config: BridgeConfig) -> Self {
		Self { config }
	}

	fn spawn(&self) -> Result<Child, SupervisorError> {
		let cfg = &self.config;
		let mut command = Command::new(&cfg.program);
		command
			.args(expand_args(&cfg.args, &cfg.listen_addr, cfg.port))
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::inherit());
		for (key, value) in &cfg.env {
			command.env(key, expand_placeholders(value, &cfg.listen_addr, cfg.port));
		}

		// Keep terminal Ctrl-C away from the bridge; shutdown goes through the flags.
		#[cfg(unix)]
		std::os::unix::process::CommandExt::process_group(&mut command, 0);

		command.spawn().map_err(|source| SupervisorError::Spawn {
			program: cfg.program.clone(),
			source,
		})
	}

	fn serve(&self, child: &mut Child, flags: &ServiceFlags) -> Result<(), SupervisorError> {
		let cfg = &self.config;
		loop {
			if flags.exit_requested() {
				return Ok(());
			}

			if let Some(status) = child.try_wait()? {
				return Err(SupervisorError::Exited(status.to_string()));
			}

			if !flags.is_started() && port_accepting(&cfg.listen_addr, cfg.port, READY_PROBE_TIMEOUT) {
				info!(target: "wsr.bridge", addr = %cfg.base_url(), pid = child.id(), "bridge accepting connections");
				flags.mark_started();
			}

			std::thread::sleep(EXIT_POLL_INTERVAL);
		}
	}
}

impl BackgroundService for ProcessService {
	fn name(&self) -> &str {
		"bridge"
	}

	fn run(self, flags: &ServiceFlags) -> Result<(), SupervisorError> {
		let cfg = &self.config;
		if !port_available(&cfg.listen_addr, cfg.port) {
			return Err(SupervisorError::StartupFailed(format!(
				"{}:{} is already in use; stop the other listener or change the bridge port",
				cfg.listen_addr, cfg.port
			)));
		}

		let mut child = self.spawn()?;
		debug!(target: "wsr.bridge", program = %cfg.program, pid = child.id(), "bridge process spawned");

		let outcome = self.serve(&mut child, flags);
		stop_child(&mut child, cfg.shutdown_grace());
		outcome
	}
}

fn stop_child(child: &mut Child, grace: Duration) {
	if let Ok(Some(status)) = child.try_wait() {
		debug!(target: "wsr.bridge", %status, "bridge process already exited");
		return;
	}

	let pid = child.id();
	if request_terminate(pid) {
		let deadline = Instant::now() + grace;
		while Instant::now() < deadline {
			if let Ok(Some(status)) = child.try_wait() {
				debug!(target: "wsr.bridge", pid, %status, "bridge process terminated");
				return;
			}
			std::thread::sleep(EXIT_POLL_INTERVAL);
		}
		warn!(target: "wsr.bridge", pid, grace_ms = grace.as_millis() as u64, "bridge ignored terminate request; killing");
	}

	if let Err(err) = child.kill() {
		warn!(target: "wsr.bridge", pid, error = %err, "failed to kill bridge process");
	}
	let _ = child.wait();
}
