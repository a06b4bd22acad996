//! Process-level configuration: file locations and tunables.
//!
//! Defaults follow the platform conventions (`<local-app-data>/Arca` for
//! the vault, the user runtime directory for the IPC socket) and every
//! path is overridable, either through an `arca.toml` next to the data
//! directory or programmatically — the test suites point everything at
//! temp directories.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{ArcaError, Result};

/// Name of the IPC endpoint. SDK clients discover the server by it.
pub const ENDPOINT_NAME: &str = "arca-vault-simple";

/// Process configuration, loadable from `arca.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the vault, key store, and logs.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// IPC socket path. Defaults to the user runtime directory.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Size of the in-memory audit window.
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("Arca")
}

fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(format!("{ENDPOINT_NAME}.sock"))
}

fn default_audit_capacity() -> usize {
    crate::audit::DEFAULT_CAPACITY
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            socket_path: default_socket_path(),
            audit_capacity: default_audit_capacity(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the data directory.
    const FILE_NAME: &'static str = "arca.toml";

    /// Load settings from `<data_dir>/arca.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&default_data_dir())
    }

    /// Load settings from `<dir>/arca.toml`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;
        toml::from_str(&contents).map_err(|e| {
            ArcaError::Config(format!("failed to parse {}: {e}", config_path.display()))
        })
    }

    /// Settings rooted entirely inside `dir` — used by tests and by
    /// hosts that sandbox their data.
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            data_dir: dir.to_path_buf(),
            socket_path: dir.join(format!("{ENDPOINT_NAME}.sock")),
            audit_capacity: default_audit_capacity(),
        }
    }

    /// Path to the vault container.
    pub fn vault_path(&self) -> PathBuf {
        self.data_dir.join("vault.vlt")
    }

    /// Path to the API-key companion file, sibling of the vault.
    pub fn keys_path(&self) -> PathBuf {
        self.data_dir.join("vault.keys")
    }

    /// Directory for the per-day audit files.
    pub fn audit_dir(&self) -> PathBuf {
        self.data_dir.join("Logs")
    }
}
