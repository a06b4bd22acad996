//! The API-key companion file (`<vault>.keys`).
//!
//! Layout: `[payload_len: i32 LE][payload]` where the payload is
//! `nonce || tag || AES-256-GCM ciphertext` of the API-keys JSON array,
//! encrypted under the vault's derived key.  There is no magic header.
//!
//! Reads are deliberately forgiving: a missing, truncated, or undecryptable
//! file yields an empty key set.  Opening a freshly created vault must not
//! fail on "no keys file", and a corrupt keys file must not brick the vault
//! it sits next to.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::apikey::ApiKeyEntry;
use crate::crypto::aead;
use crate::errors::{ArcaError, Result};
use crate::vault::format::atomic_write;

/// Write the key set, encrypted under the vault's derived key.
pub fn write(path: &Path, key: &[u8], entries: &[ApiKeyEntry]) -> Result<()> {
    let plaintext = serde_json::to_vec(entries)
        .map_err(|e| ArcaError::Serialization(format!("api keys: {e}")))?;
    let payload = aead::encrypt(key, &plaintext)?;

    let payload_len = i32::try_from(payload.len())
        .map_err(|_| ArcaError::Serialization("api-key payload exceeds i32::MAX bytes".into()))?;

    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(&payload);

    atomic_write(path, &buf)
}

/// Read the key set.  Any failure collapses to an empty set.
pub fn read(path: &Path, key: &[u8]) -> Vec<ApiKeyEntry> {
    match try_read(path, key) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "unreadable api-key store, treating as empty");
            Vec::new()
        }
    }
}

fn try_read(path: &Path, key: &[u8]) -> Result<Vec<ApiKeyEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let data = fs::read(path)?;
    if data.len() < 4 {
        return Err(ArcaError::Corrupt("key store shorter than its length prefix".into()));
    }

    let payload_len = i32::from_le_bytes(data[0..4].try_into().expect("fixed slice"));
    let payload_len = usize::try_from(payload_len)
        .map_err(|_| ArcaError::Corrupt("negative key-store payload length".into()))?;

    let payload = &data[4..];
    if payload.len() != payload_len {
        return Err(ArcaError::Corrupt("key-store payload length mismatch".into()));
    }

    let plaintext = aead::decrypt(key, payload)?;
    serde_json::from_slice(&plaintext)
        .map_err(|e| ArcaError::Corrupt(format!("api-key JSON: {e}")))
}
