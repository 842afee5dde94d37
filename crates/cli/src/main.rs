use clap::Parser;
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use wsr_cli::cli::{Cli, Commands};
use wsr_cli::config::RelayConfig;
use wsr_cli::{commands, logging};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	let mut log_guard = None;
	if let Err(err) = run(cli, &mut log_guard).await {
		if tracing::dispatcher::has_been_set() {
			error!(target: "wsr", error = %err, "command failed");
		} else {
			eprintln!("wsr: {err:#}");
		}
		drop(log_guard);
		std::process::exit(1);
	}
}

async fn run(cli: Cli, log_guard: &mut Option<WorkerGuard>) -> anyhow::Result<()> {
	let chat = match &cli.command {
		Commands::Run { chat, .. } => chat.clone(),
		_ => None,
	};

	let mut config = RelayConfig::resolve(cli.app_dir.as_deref())?;
	config.apply(&cli.overrides.to_overrides(chat));

	let log_file = (!cli.no_log_file).then(|| config.paths().log_file());
	*log_guard = logging::init_logging(cli.verbose, log_file.as_deref())?;

	commands::dispatch(cli.command, config).await?;
	Ok(())
}
