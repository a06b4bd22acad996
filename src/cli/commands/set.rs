//! `arca add` / `arca update` — write a secret.

use crate::cli::commands::open_session;
use crate::cli::{output, prompt_secret_value, Cli};
use crate::errors::Result;

pub fn add(cli: &Cli, key: &str, value: Option<&str>, description: Option<&str>) -> Result<()> {
    let mut session = open_session(cli)?;

    let prompted;
    let value = match value {
        Some(v) => v,
        None => {
            prompted = prompt_secret_value(key)?;
            prompted.as_str()
        }
    };

    session.add_secret(key, value, description)?;
    output::success(&format!("Added secret '{key}'"));

    session.close();
    Ok(())
}

pub fn update(cli: &Cli, key: &str, value: Option<&str>, description: Option<&str>) -> Result<()> {
    let mut session = open_session(cli)?;

    let prompted;
    let value = match value {
        Some(v) => v,
        None => {
            prompted = prompt_secret_value(key)?;
            prompted.as_str()
        }
    };

    session.update_secret(key, value, description)?;
    output::success(&format!("Updated secret '{key}'"));

    session.close();
    Ok(())
}
