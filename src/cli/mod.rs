//! CLI module — Clap argument parser, output helpers, and command
//! implementations.  The binary stands in for the graphical shell: it
//! drives the same controller surface the GUI would.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;
use zeroize::Zeroizing;

use crate::config::Settings;
use crate::errors::{ArcaError, Result};

/// Minimum master-password length enforced at the prompt layer.
const MIN_PASSWORD_LEN: usize = 8;

/// Arca CLI: host-local encrypted secrets manager.
#[derive(Parser)]
#[command(name = "arca", about = "Host-local encrypted secrets manager", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory override (default: <local-app-data>/Arca)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create a new vault
    Init,

    /// Add a secret
    Add {
        /// Secret name (case-insensitively unique)
        key: String,
        /// Secret value (omit for interactive prompt)
        value: Option<String>,
        /// Human-readable description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Print a secret's value
    Get {
        /// Secret name
        key: String,
    },

    /// List secrets
    List {
        /// Case-insensitive substring filter
        filter: Option<String>,
    },

    /// Update an existing secret
    Update {
        /// Secret name
        key: String,
        /// New value (omit for interactive prompt)
        value: Option<String>,
        /// New description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete a secret
    Delete {
        /// Secret name
        key: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Manage API keys
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Unlock the vault and serve IPC requests until interrupted
    Serve,

    /// Export the vault to an encrypted archive
    Export {
        /// Archive path (e.g. backup.arcavault)
        output: PathBuf,
    },

    /// Import an encrypted archive into the vault
    Import {
        /// Archive path
        file: PathBuf,
        /// Overwrite secrets whose key already exists
        #[arg(long)]
        overwrite: bool,
    },

    /// Show the audit log
    Audit {
        /// Number of entries to show
        #[arg(long, default_value = "50")]
        last: usize,
        /// Show aggregate statistics instead of entries
        #[arg(long)]
        stats: bool,
    },
}

/// API-key subcommands.
#[derive(clap::Subcommand)]
pub enum KeyAction {
    /// Generate a new API key (the plaintext is shown exactly once)
    Generate {
        /// Key name
        name: String,
        /// Grant access to every secret
        #[arg(long)]
        full: bool,
        /// Secret the key may read (repeatable)
        #[arg(long = "allow")]
        allowed_secrets: Vec<String>,
        /// Secret-key prefix the key may read (repeatable)
        #[arg(long = "prefix")]
        allowed_prefixes: Vec<String>,
        /// Allow the key to list secret names
        #[arg(long)]
        can_list: bool,
    },

    /// Revoke an API key by id
    Revoke {
        /// Key id (shown by `arca key list`)
        id: uuid::Uuid,
    },

    /// List stored API keys
    List,
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolve settings from the global `--data-dir` flag or `arca.toml`.
pub fn settings(cli: &Cli) -> Result<Settings> {
    match &cli.data_dir {
        Some(dir) => Ok(Settings::rooted_at(dir)),
        None => Settings::load(),
    }
}

/// Get the vault password: `ARCA_PASSWORD` for scripted use, otherwise
/// an interactive prompt.
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on
/// drop.
pub fn prompt_password() -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var("ARCA_PASSWORD") {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter vault password")
        .interact()
        .map_err(|e| ArcaError::Config(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password with confirmation (used during `init`).
/// Enforces a minimum length; also respects `ARCA_PASSWORD`.
pub fn prompt_new_password() -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var("ARCA_PASSWORD") {
        if !pw.is_empty() {
            if pw.len() < MIN_PASSWORD_LEN {
                return Err(ArcaError::Config(format!(
                    "password must be at least {MIN_PASSWORD_LEN} characters"
                )));
            }
            return Ok(Zeroizing::new(pw));
        }
    }

    loop {
        let password = dialoguer::Password::new()
            .with_prompt("Choose vault password")
            .with_confirmation("Confirm vault password", "Passwords do not match, try again")
            .interact()
            .map_err(|e| ArcaError::Config(format!("password prompt: {e}")))?;

        if password.len() < MIN_PASSWORD_LEN {
            output::warning(&format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters. Try again."
            ));
            continue;
        }

        return Ok(Zeroizing::new(password));
    }
}

/// Prompt for a secret value when it was not passed on the command line.
pub fn prompt_secret_value(key: &str) -> Result<Zeroizing<String>> {
    let value = dialoguer::Password::new()
        .with_prompt(format!("Value for '{key}'"))
        .interact()
        .map_err(|e| ArcaError::Config(format!("value prompt: {e}")))?;
    Ok(Zeroizing::new(value))
}
