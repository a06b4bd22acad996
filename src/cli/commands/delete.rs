//! `arca delete` — remove a secret.

use dialoguer::Confirm;

use crate::cli::commands::open_session;
use crate::cli::{output, Cli};
use crate::errors::{ArcaError, Result};

pub fn execute(cli: &Cli, key: &str, force: bool) -> Result<()> {
    let mut session = open_session(cli)?;

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete secret '{key}'?"))
            .default(false)
            .interact()
            .map_err(|e| ArcaError::Config(format!("confirmation prompt: {e}")))?;
        if !confirmed {
            output::info("Aborted.");
            session.close();
            return Ok(());
        }
    }

    session.delete_secret(key)?;
    output::success(&format!("Deleted secret '{key}'"));

    session.close();
    Ok(())
}
