//! `arca serve` — unlock the vault and serve until interrupted.

use crate::cli::commands::open_session;
use crate::cli::{output, settings, Cli};
use crate::errors::Result;

pub fn execute(cli: &Cli) -> Result<()> {
    let socket = settings(cli)?.socket_path;
    let session = open_session(cli)?;

    output::success(&format!(
        "Serving {} secret(s) on {}",
        session.secret_count(),
        socket.display()
    ));
    output::tip("Press Ctrl-C to lock the vault and exit.");

    // The server runs on its own thread; this thread just waits for the
    // interrupt signal.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let _ = tokio::signal::ctrl_c().await;
    });

    output::info("Locking vault.");
    session.close();
    Ok(())
}
