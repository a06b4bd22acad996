//! `arca get` — print one secret value to stdout.

use crate::cli::commands::open_session;
use crate::cli::Cli;
use crate::errors::Result;

pub fn execute(cli: &Cli, key: &str) -> Result<()> {
    let session = open_session(cli)?;
    let entry = session.get_secret(key)?;

    // Bare value on stdout so it can be piped.
    println!("{}", entry.value);

    session.close();
    Ok(())
}
