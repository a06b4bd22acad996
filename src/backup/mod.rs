//! Encrypted backup archives (export/import).
//!
//! An `.arcavault` archive is self-contained: it carries its own salt and
//! is protected by its own password, independent of the vault's master
//! password.  Layout (integers little-endian):
//!
//! ```text
//! [ARCAEXPORT: 10 bytes][version: i32][salt: 16][nonce: 12][tag: 16][cipher_len: i32][cipher]
//! ```
//!
//! The cipher is AES-256-GCM over gzip(JSON payload).  Version 2 derives
//! the archive key with Argon2id; version 1 archives (PBKDF2-HMAC-SHA256,
//! 100 000 iterations) are read-only legacy — new exports always write v2.
//!
//! Exported API keys carry no hashes and no ids: on import they become
//! inactive stubs the user must regenerate.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::apikey::ApiKeyEntry;
use crate::crypto::{aead, kdf, NONCE_LEN, SALT_LEN, TAG_LEN};
use crate::errors::{ArcaError, Result};
use crate::vault::secret::SecretEntry;

/// Magic bytes at the start of every archive.
const MAGIC: &[u8; 10] = b"ARCAEXPORT";

/// Current archive version (Argon2id KDF).
pub const CURRENT_VERSION: i32 = 2;

/// Legacy archive version (PBKDF2 KDF). Read-only.
pub const LEGACY_VERSION: i32 = 1;

/// Fixed-size prefix: 10 (magic) + 4 (version) + 16 (salt) + 12 (nonce) + 16 (tag) + 4 (cipher_len).
const HEADER_LEN: usize = 10 + 4 + SALT_LEN + NONCE_LEN + TAG_LEN + 4;

/// The decrypted archive payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPayload {
    pub version: i32,
    pub exported_at: DateTime<Utc>,
    /// Identifier of the host the archive was written on.
    pub exported_from: String,
    pub secrets: Vec<ExportedSecret>,
    pub api_keys: Vec<ExportedApiKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedSecret {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An API key as it appears in an archive.  Deliberately hashless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedApiKey {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub access_level: String,
    #[serde(default)]
    pub allowed_secrets: Vec<String>,
    #[serde(default)]
    pub can_list: bool,
}

/// Options for merging an archive into an existing vault.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Overwrite secrets whose key already exists instead of skipping them.
    pub overwrite_existing: bool,
}

/// Counts returned by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub secrets_imported: usize,
    pub secrets_skipped: usize,
    pub api_keys_imported: usize,
    pub api_keys_skipped: usize,
}

/// Build the archive payload from live vault contents.
pub fn build_payload(secrets: &[SecretEntry], api_keys: &[ApiKeyEntry]) -> ExportPayload {
    ExportPayload {
        version: CURRENT_VERSION,
        exported_at: Utc::now(),
        exported_from: host_identifier(),
        secrets: secrets
            .iter()
            .map(|s| ExportedSecret {
                key: s.key.clone(),
                value: s.value.clone(),
                description: s.description.clone(),
                created_at: s.created_at,
            })
            .collect(),
        api_keys: api_keys
            .iter()
            .map(|k| ExportedApiKey {
                name: k.name.clone(),
                description: k.description.clone(),
                created_at: k.created_at,
                access_level: k.permissions.level.name().to_string(),
                allowed_secrets: k.permissions.allowed_secrets.clone(),
                can_list: k.permissions.can_list,
            })
            .collect(),
    }
}

/// Encrypt `payload` under `password` and write a v2 archive to `path`.
pub fn write_archive(path: &Path, password: &str, payload: &ExportPayload) -> Result<()> {
    let json = serde_json::to_vec(payload)
        .map_err(|e| ArcaError::Serialization(format!("export payload: {e}")))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;

    let salt = kdf::generate_salt();
    let key = kdf::derive_key(password.as_bytes(), &salt)?;
    let blob = aead::encrypt(&key, &compressed)?;

    // aead produces nonce || tag || ciphertext; the archive stores the
    // same three parts as separate header fields.
    let (nonce, rest) = blob.split_at(NONCE_LEN);
    let (tag, cipher) = rest.split_at(TAG_LEN);

    let cipher_len = i32::try_from(cipher.len())
        .map_err(|_| ArcaError::Serialization("archive cipher exceeds i32::MAX bytes".into()))?;

    let mut buf = Vec::with_capacity(HEADER_LEN + cipher.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&CURRENT_VERSION.to_le_bytes());
    buf.extend_from_slice(&salt);
    buf.extend_from_slice(nonce);
    buf.extend_from_slice(tag);
    buf.extend_from_slice(&cipher_len.to_le_bytes());
    buf.extend_from_slice(cipher);

    fs::write(path, buf)?;
    Ok(())
}

/// Read and decrypt an archive, deriving the key per its version.
///
/// A tag mismatch surfaces as [`ArcaError::InvalidPassword`] for both v1
/// and v2 archives.
pub fn read_archive(path: &Path, password: &str) -> Result<ExportPayload> {
    let data = fs::read(path)?;

    if data.len() < MAGIC.len() || &data[..MAGIC.len()] != MAGIC {
        return Err(ArcaError::NotAVault);
    }
    if data.len() < HEADER_LEN {
        return Err(ArcaError::NotAVault);
    }

    let mut offset = MAGIC.len();
    let version = i32::from_le_bytes(data[offset..offset + 4].try_into().expect("fixed slice"));
    offset += 4;

    let key = match version {
        LEGACY_VERSION => kdf::derive_key_pbkdf2(password.as_bytes(), &data[offset..offset + SALT_LEN]),
        CURRENT_VERSION => kdf::derive_key(password.as_bytes(), &data[offset..offset + SALT_LEN])?,
        other => return Err(ArcaError::UnsupportedVersion(other.unsigned_abs())),
    };
    offset += SALT_LEN;

    let nonce = &data[offset..offset + NONCE_LEN];
    offset += NONCE_LEN;
    let tag = &data[offset..offset + TAG_LEN];
    offset += TAG_LEN;

    let cipher_len = i32::from_le_bytes(data[offset..offset + 4].try_into().expect("fixed slice"));
    offset += 4;
    let cipher_len = usize::try_from(cipher_len)
        .map_err(|_| ArcaError::Corrupt("negative archive cipher length".into()))?;

    let cipher = &data[offset..];
    if cipher.len() != cipher_len {
        return Err(ArcaError::Corrupt("archive cipher length mismatch".into()));
    }

    let mut blob = Vec::with_capacity(NONCE_LEN + TAG_LEN + cipher.len());
    blob.extend_from_slice(nonce);
    blob.extend_from_slice(tag);
    blob.extend_from_slice(cipher);

    let compressed = match aead::decrypt(&key, &blob) {
        Ok(bytes) => bytes,
        Err(ArcaError::Authentication) => return Err(ArcaError::InvalidPassword),
        Err(e) => return Err(e),
    };

    let mut json = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .map_err(|e| ArcaError::Corrupt(format!("archive gzip: {e}")))?;

    serde_json::from_slice(&json).map_err(|e| ArcaError::Corrupt(format!("archive JSON: {e}")))
}

fn host_identifier() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown-host".to_string())
}
