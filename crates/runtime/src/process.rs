//! Process and port lifecycle helpers used by the bridge service.

use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Returns `true` when `host:port` can be bound on this machine.
pub fn port_available(host: &str, port: u16) -> bool {
	TcpListener::bind((host, port)).is_ok()
}

/// Returns `true` when something accepts TCP connections on `host:port`
/// within `timeout`.
pub fn port_accepting(host: &str, port: u16, timeout: Duration) -> bool {
	let Ok(addrs) = (host, port).to_socket_addrs() else {
		return false;
	};
	addrs.into_iter().any(|addr| TcpStream::connect_timeout(&addr, timeout).is_ok())
}

/// Asks process `pid` to terminate gracefully.
///
/// Returns `true` when the signal (or Windows close request) was delivered.
pub fn request_terminate(pid: u32) -> bool {
	#[cfg(unix)]
	{
		if pid == 0 {
			return false;
		}

		std::process::Command::new("kill")
			.args(["-TERM", &pid.to_string()])
			.status()
			.map(|status| status.success())
			.unwrap_or(false)
	}

	#[cfg(windows)]
	{
		std::process::Command::new("taskkill")
			.args(["/PID", &pid.to_string()])
			.status()
			.map(|status| status.success())
			.unwrap_or(false)
	}

	#[cfg(not(any(unix, windows)))]
	{
		let _ = pid;
		false
	}
}

/// Substitutes `{addr}`, `{host}` and `{port}` placeholders in `value`.
pub fn expand_placeholders(value: &str, host: &str, port: u16) -> String {
	value
		.replace("{addr}", &format!("{host}:{port}"))
		.replace("{host}", host)
		.replace("{port}", &port.to_string())
}

/// Applies [`expand_placeholders`] to every argument.
pub fn expand_args(args: &[String], host: &str, port: u16) -> Vec<String> {
	args.iter().map(|arg| expand_placeholders(arg, host, port)).collect()
}
