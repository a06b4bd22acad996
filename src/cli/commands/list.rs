//! `arca list` — table of secret names and metadata.

use crate::cli::commands::open_session;
use crate::cli::{output, Cli};
use crate::errors::Result;

pub fn execute(cli: &Cli, filter: Option<&str>) -> Result<()> {
    let session = open_session(cli)?;
    let secrets = session.list_secrets(filter);
    output::print_secrets_table(&secrets);

    session.close();
    Ok(())
}
