//! One module per command.

pub mod audit_cmd;
pub mod delete;
pub mod export;
pub mod get;
pub mod import_cmd;
pub mod init;
pub mod key;
pub mod list;
pub mod serve;
pub mod set;

use crate::cli::{output, prompt_password, settings, Cli};
use crate::errors::Result;
use crate::session::Session;

/// Build a session and unlock it with the prompted password.
///
/// Every command except `init` starts here.
pub fn open_session(cli: &Cli) -> Result<Session> {
    let mut session = Session::new(settings(cli)?)?;
    if !session.vault_exists() {
        output::tip("No vault found. Run `arca init` to create one.");
    }
    let password = prompt_password()?;
    session.unlock(&password)?;
    Ok(session)
}
