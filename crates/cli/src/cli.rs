use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Overrides;

#[derive(Parser, Debug)]
#[command(name = "wsr")]
#[command(about = "Relay chat messages from a browser session to a local messaging bridge")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Application directory (defaults to ~/.wapp-signal-relay)
	#[arg(long, global = true, value_name = "DIR")]
	pub app_dir: Option<PathBuf>,

	/// Do not write a log file in the application directory
	#[arg(long, global = true)]
	pub no_log_file: bool,

	#[command(flatten)]
	pub overrides: OverrideArgs,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OverrideArgs {
	/// Seconds to wait for the source login (QR scan)
	#[arg(long, global = true, value_name = "SECS")]
	pub login_timeout: Option<u64>,

	/// Port of the local bridge REST API
	#[arg(long, global = true, value_name = "PORT")]
	pub bridge_port: Option<u16>,

	/// Remote debugging port of the browser
	#[arg(long, global = true, value_name = "PORT")]
	pub cdp_port: Option<u16>,

	/// Only attach to an already running debugging browser
	#[arg(long, global = true)]
	pub no_launch: bool,
}

impl OverrideArgs {
	pub fn to_overrides(&self, chat_filter: Option<String>) -> Overrides {
		Overrides {
			login_timeout_secs: self.login_timeout,
			bridge_port: self.bridge_port,
			cdp_port: self.cdp_port,
			chat_filter,
			no_launch: self.no_launch,
		}
	}
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Log in, start the bridge, and relay unread messages until Ctrl-C
	Run {
		/// Substring of the chat name to relay
		#[arg(long)]
		chat: Option<String>,

		/// Bootstrap again this many times after a login timeout or lost session
		#[arg(long, default_value_t = 0)]
		retries: u32,
	},

	/// Log in to the source platform and save the pairing QR
	Login,

	/// Run the bridge service in the foreground until Ctrl-C
	Bridge {
		/// Also request registration of the stored identity
		#[arg(long)]
		register: bool,
	},

	/// Show or reset the stored identity
	Identity {
		#[command(subcommand)]
		action: IdentityAction,
	},

	/// Verify the application directory can be used
	Check,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityAction {
	/// Print the stored identity (masked)
	Show,
	/// Remove the stored identity so the next run asks again
	Reset,
	/// Ask for an identity now and store it
	Set,
}
