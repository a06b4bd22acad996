//! `arca init` — create a new vault.

use crate::cli::{output, prompt_new_password, settings, Cli};
use crate::errors::Result;
use crate::session::Session;

pub fn execute(cli: &Cli) -> Result<()> {
    let settings = settings(cli)?;
    let vault_path = settings.vault_path();
    let mut session = Session::new(settings)?;

    let password = prompt_new_password()?;
    session.create_vault(&password)?;

    output::success(&format!("Vault created at {}", vault_path.display()));
    output::warning("There is no password recovery. Losing the master password loses all data.");
    output::tip("Run `arca add <key>` to add a secret.");
    output::tip("Run `arca serve` to serve secrets to local clients.");

    session.close();
    Ok(())
}
