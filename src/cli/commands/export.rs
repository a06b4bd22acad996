//! `arca export` — write an encrypted backup archive.

use std::path::Path;

use crate::cli::commands::open_session;
use crate::cli::{output, Cli};
use crate::errors::{ArcaError, Result};

pub fn execute(cli: &Cli, output_path: &Path) -> Result<()> {
    let session = open_session(cli)?;

    let export_password = dialoguer::Password::new()
        .with_prompt("Choose archive password")
        .with_confirmation("Confirm archive password", "Passwords do not match, try again")
        .interact()
        .map_err(|e| ArcaError::Config(format!("password prompt: {e}")))?;

    session.export(&export_password, output_path)?;
    output::success(&format!("Exported vault to {}", output_path.display()));
    output::info("API keys are exported without their hashes; regenerate them after import.");

    session.close();
    Ok(())
}
