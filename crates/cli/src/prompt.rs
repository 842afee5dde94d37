//! Terminal identity prompt with input echo disabled.

use std::io::{self, BufRead, IsTerminal, Write};

#[cfg(unix)]
use std::os::fd::AsFd;

#[cfg(unix)]
use nix::sys::termios::{LocalFlags, SetArg, Termios, tcgetattr, tcsetattr};

use wsr::IdentityPrompt;

/// Reads identities from stdin, hiding input when stdin is a terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl IdentityPrompt for TerminalPrompt {
	fn read_identity(&mut self, prompt: &str) -> io::Result<Option<String>> {
		let mut stderr = io::stderr();
		write!(stderr, "{prompt}")?;
		stderr.flush()?;

		let stdin = io::stdin();
		let line = if stdin.is_terminal() {
			#[cfg(unix)]
			let _echo = EchoGuard::disable(io::stdin())?;
			let line = read_line(&mut stdin.lock())?;
			writeln!(stderr)?;
			line
		} else {
			read_line(&mut stdin.lock())?
		};
		Ok(line)
	}

	fn reject(&mut self, message: &str) {
		eprintln!("{message}");
	}
}

/// Reads one line without its terminator. `None` at end of input.
pub fn read_line(reader: &mut impl BufRead) -> io::Result<Option<String>> {
	let mut line = String::new();
	if reader.read_line(&mut line)? == 0 {
		return Ok(None);
	}
	Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Clears the echo flag on a terminal and restores the saved settings on drop.
#[cfg(unix)]
struct EchoGuard<F: AsFd> {
	fd: F,
	saved: Termios,
}

#[cfg(unix)]
impl<F: AsFd> EchoGuard<F> {
	fn disable(fd: F) -> io::Result<Self> {
		let saved = tcgetattr(&fd)?;
		let mut hidden = saved.clone();
		hidden.local_flags.remove(LocalFlags::ECHO);
		tcsetattr(&fd, SetArg::TCSANOW, &hidden)?;
		Ok(Self { fd, saved })
	}
}

#[cfg(unix)]
impl<F: AsFd> Drop for EchoGuard<F> {
	fn drop(&mut self) {
		let _ = tcsetattr(&self.fd, SetArg::TCSANOW, &self.saved);
	}
}
