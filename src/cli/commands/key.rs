//! `arca key` — API-key lifecycle.

use uuid::Uuid;

use crate::apikey::{AccessLevel, ApiKeyPermissions};
use crate::cli::commands::open_session;
use crate::cli::{output, Cli};
use crate::errors::Result;

pub fn generate(
    cli: &Cli,
    name: &str,
    full: bool,
    allowed_secrets: Vec<String>,
    allowed_prefixes: Vec<String>,
    can_list: bool,
) -> Result<()> {
    let mut session = open_session(cli)?;

    let permissions = if full {
        ApiKeyPermissions::full()
    } else {
        ApiKeyPermissions {
            level: AccessLevel::Restricted,
            allowed_secrets,
            allowed_prefixes,
            can_list,
        }
    };

    let (plaintext, entry) = session.generate_api_key(name, permissions)?;

    output::success(&format!("Generated API key '{}' ({})", entry.name, entry.id));
    output::warning("This is the only time the key is shown. Store it now.");
    println!("{plaintext}");
    output::tip("Clients usually carry it in the ARCA_API_KEY environment variable.");

    session.close();
    Ok(())
}

pub fn revoke(cli: &Cli, id: Uuid) -> Result<()> {
    let mut session = open_session(cli)?;
    session.revoke_api_key(id)?;
    output::success(&format!("Revoked API key {id}"));

    session.close();
    Ok(())
}

pub fn list(cli: &Cli) -> Result<()> {
    let session = open_session(cli)?;
    let keys = session.list_api_keys();
    output::print_api_keys_table(&keys);

    session.close();
    Ok(())
}
