use wsr::CredentialStore;

use crate::cli::IdentityAction;
use crate::config::RelayConfig;
use crate::error::Result;
use crate::prompt::TerminalPrompt;

fn store(config: &RelayConfig) -> CredentialStore {
	CredentialStore::new(config.paths().credentials_file()).with_prompt_text(&config.identity_prompt)
}

/// Returns the stored identity, asking on the terminal when there is none.
pub fn acquire(config: &RelayConfig) -> Result<String> {
	Ok(store(config).get_identity(&mut TerminalPrompt)?)
}

pub fn run(config: &RelayConfig, action: IdentityAction) -> Result<()> {
	let mut store = store(config);
	match action {
		IdentityAction::Show => match store.load()? {
			Some(record) if record.validated => println!("{}", mask_identity(&record.identity)),
			Some(record) => println!("{} (invalid; you will be asked again)", mask_identity(&record.identity)),
			None => println!("no identity stored in {}", store.path().display()),
		},
		IdentityAction::Reset => {
			if store.clear()? {
				println!("removed {}", store.path().display());
			} else {
				println!("no identity stored in {}", store.path().display());
			}
		}
		IdentityAction::Set => {
			store.clear()?;
			let identity = store.get_identity(&mut TerminalPrompt)?;
			println!("stored {}", mask_identity(&identity));
		}
	}
	Ok(())
}

/// Keeps the first three and last two characters visible.
pub fn mask_identity(identity: &str) -> String {
	let chars: Vec<char> = identity.chars().collect();
	if chars.len() <= 5 {
		return "*".repeat(chars.len());
	}
	let head: String = chars[..3].iter().collect();
	let tail: String = chars[chars.len() - 2..].iter().collect();
	format!("{head}{}{tail}", "*".repeat(chars.len() - 5))
}
