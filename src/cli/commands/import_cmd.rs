//! `arca import` — merge an encrypted backup archive into the vault.

use std::path::Path;

use crate::backup::ImportOptions;
use crate::cli::commands::open_session;
use crate::cli::{output, Cli};
use crate::errors::{ArcaError, Result};

pub fn execute(cli: &Cli, file: &Path, overwrite: bool) -> Result<()> {
    let mut session = open_session(cli)?;

    let archive_password = dialoguer::Password::new()
        .with_prompt("Enter archive password")
        .interact()
        .map_err(|e| ArcaError::Config(format!("password prompt: {e}")))?;

    let result = session.import(
        &archive_password,
        file,
        ImportOptions {
            overwrite_existing: overwrite,
        },
    )?;

    output::success(&format!(
        "Imported {} secret(s) ({} skipped), {} API key(s) ({} skipped)",
        result.secrets_imported,
        result.secrets_skipped,
        result.api_keys_imported,
        result.api_keys_skipped
    ));
    if result.api_keys_imported > 0 {
        output::info("Imported API keys are inactive stubs — regenerate them to use them.");
    }

    session.close();
    Ok(())
}
