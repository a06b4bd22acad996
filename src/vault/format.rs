//! Binary vault container format.
//!
//! A `.vlt` file has this layout (integers little-endian):
//!
//! ```text
//! [ARCA: 4 bytes][version: u32][salt: 16 bytes][created_at: i64][payload_len: i32][payload]
//! ```
//!
//! - **Magic** (`ARCA`): identifies the file as an Arca vault.
//! - **Version**: container version (currently `1`).
//! - **Salt**: the Argon2id salt for this vault, generated once at creation.
//! - **created_at**: nanoseconds since the Unix epoch, UTC.
//! - **Payload**: `nonce || tag || AES-256-GCM ciphertext` of the secrets
//!   JSON array (see [`crate::crypto::aead`]).
//!
//! Saves rewrite the file in full through a temp-file + rename, so readers
//! never observe a half-written container.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::crypto::{aead, SALT_LEN};
use crate::errors::{ArcaError, Result};
use crate::vault::secret::SecretEntry;

/// Magic bytes at the start of every vault file.
const MAGIC: &[u8; 4] = b"ARCA";

/// Current container version.
pub const CURRENT_VERSION: u32 = 1;

/// Fixed-size prefix: 4 (magic) + 4 (version) + 16 (salt) + 8 (created_at) + 4 (payload_len).
const HEADER_LEN: usize = 4 + 4 + SALT_LEN + 8 + 4;

/// Immutable per-vault metadata, created exactly once at vault creation.
#[derive(Debug, Clone)]
pub struct VaultMetadata {
    pub version: u32,
    pub salt: [u8; SALT_LEN],
    pub created_at: DateTime<Utc>,
}

impl VaultMetadata {
    /// Metadata for a brand-new vault: fresh random salt, current version.
    pub fn generate() -> Self {
        Self {
            version: CURRENT_VERSION,
            salt: crate::crypto::generate_salt(),
            created_at: Utc::now(),
        }
    }
}

/// Write a vault file to disk atomically.
///
/// Serializes `secrets` to JSON, encrypts under `key`, and writes the full
/// container via temp-file + rename in the same directory.
pub fn write(path: &Path, meta: &VaultMetadata, key: &[u8], secrets: &[SecretEntry]) -> Result<()> {
    let plaintext = serde_json::to_vec(secrets)
        .map_err(|e| ArcaError::Serialization(format!("secrets: {e}")))?;
    let payload = aead::encrypt(key, &plaintext)?;

    let payload_len = i32::try_from(payload.len())
        .map_err(|_| ArcaError::Serialization("payload exceeds i32::MAX bytes".into()))?;
    let created_at = encode_datetime(meta.created_at)?;

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&meta.version.to_le_bytes());
    buf.extend_from_slice(&meta.salt);
    buf.extend_from_slice(&created_at.to_le_bytes());
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(&payload);

    atomic_write(path, &buf)
}

/// Read and decrypt a vault file.
///
/// An AES-GCM tag mismatch surfaces as [`ArcaError::InvalidPassword`]: the
/// tag check is exactly how the session judges password correctness.
pub fn read(path: &Path, key: &[u8]) -> Result<(VaultMetadata, Vec<SecretEntry>)> {
    let data = read_bytes(path)?;
    let (meta, payload) = parse_container(&data)?;

    let plaintext = match aead::decrypt(key, payload) {
        Ok(pt) => pt,
        Err(ArcaError::Authentication) => return Err(ArcaError::InvalidPassword),
        Err(e) => return Err(e),
    };

    // Tag verified: anything that fails past this point is corruption,
    // not a wrong password.
    let secrets: Vec<SecretEntry> = serde_json::from_slice(&plaintext)
        .map_err(|e| ArcaError::Corrupt(format!("secrets JSON: {e}")))?;

    Ok((meta, secrets))
}

/// Read only the header, without a key.
///
/// The unlock path needs the salt before it can derive anything.
pub fn read_metadata(path: &Path) -> Result<VaultMetadata> {
    let data = read_bytes(path)?;
    let (meta, _) = parse_container(&data)?;
    Ok(meta)
}

/// Returns `true` if a vault container exists at `path`.
pub fn exists(path: &Path) -> bool {
    path.exists()
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(ArcaError::VaultNotFound(path.to_path_buf()));
    }
    Ok(fs::read(path)?)
}

fn parse_container(data: &[u8]) -> Result<(VaultMetadata, &[u8])> {
    if data.len() < 4 || &data[0..4] != MAGIC {
        return Err(ArcaError::NotAVault);
    }
    if data.len() < HEADER_LEN {
        return Err(ArcaError::NotAVault);
    }

    let version = u32::from_le_bytes(data[4..8].try_into().expect("fixed slice"));
    if version > CURRENT_VERSION {
        return Err(ArcaError::UnsupportedVersion(version));
    }

    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&data[8..8 + SALT_LEN]);

    let ts_start = 8 + SALT_LEN;
    let created_nanos = i64::from_le_bytes(data[ts_start..ts_start + 8].try_into().expect("fixed slice"));
    let created_at = decode_datetime(created_nanos);

    let len_start = ts_start + 8;
    let payload_len = i32::from_le_bytes(data[len_start..len_start + 4].try_into().expect("fixed slice"));
    let payload_len = usize::try_from(payload_len)
        .map_err(|_| ArcaError::Corrupt("negative payload length".into()))?;

    let payload = &data[HEADER_LEN..];
    if payload.len() != payload_len {
        return Err(ArcaError::Corrupt(format!(
            "payload length mismatch: header says {payload_len}, file has {}",
            payload.len()
        )));
    }

    Ok((
        VaultMetadata {
            version,
            salt,
            created_at,
        },
        payload,
    ))
}

/// Encode a timestamp as i64 nanoseconds since the Unix epoch.
///
/// Representable range is roughly 1677–2262; a vault timestamp outside it
/// cannot be written in this container version.
fn encode_datetime(dt: DateTime<Utc>) -> Result<i64> {
    dt.timestamp_nanos_opt().ok_or_else(|| {
        ArcaError::Serialization("timestamp outside the representable range".into())
    })
}

fn decode_datetime(nanos: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos)
}

/// Write `bytes` to `path` via a temp file in the same directory, then
/// rename over the target so readers never see a partial file.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
