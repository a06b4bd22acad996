//! `arca audit` — view the audit window and statistics.

use crate::cli::commands::open_session;
use crate::cli::{output, Cli};
use crate::errors::Result;

pub fn execute(cli: &Cli, last: usize, stats: bool) -> Result<()> {
    let session = open_session(cli)?;

    if stats {
        output::print_audit_stats(&session.audit_statistics());
    } else {
        output::print_audit_table(&session.audit_recent(last));
    }

    session.close();
    Ok(())
}
