use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in Arca.
#[derive(Debug, Error)]
pub enum ArcaError {
    // --- Container errors ---
    #[error("Not a vault file — magic number mismatch or truncated header")]
    NotAVault,

    #[error("Unsupported container version {0}")]
    UnsupportedVersion(u32),

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Vault data is corrupt: {0}")]
    Corrupt(String),

    #[error("Vault not found at {0}")]
    VaultNotFound(PathBuf),

    #[error("Vault already exists at {0}")]
    VaultAlreadyExists(PathBuf),

    // --- Crypto errors ---
    #[error("Encryption key must be exactly 32 bytes")]
    InvalidKeyLength,

    #[error("Authentication failed — wrong key or tampered data")]
    Authentication,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    // --- IPC errors ---
    #[error("Malformed request: {0}")]
    Protocol(String),

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Invalid or expired API key")]
    InvalidApiKey,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    // --- Store errors ---
    #[error("'{0}' not found")]
    NotFound(String),

    #[error("'{0}' already exists")]
    Duplicate(String),

    #[error("Invalid API key permissions: {0}")]
    InvalidPermissions(String),

    #[error("Vault is locked")]
    Locked,

    // --- Ambient errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// Convenience type alias for Arca results.
pub type Result<T> = std::result::Result<T, ArcaError>;
