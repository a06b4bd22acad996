//! Integration tests for the export/import archive codec.

use arca::apikey::{AccessLevel, ApiKeyEntry, ApiKeyPermissions};
use arca::backup::{self, ExportPayload};
use arca::crypto::{aead, derive_key_pbkdf2, generate_salt, NONCE_LEN, TAG_LEN};
use arca::errors::ArcaError;
use arca::vault::SecretEntry;
use chrono::Utc;
use std::io::Write;
use tempfile::TempDir;

fn sample_payload() -> ExportPayload {
    let secrets = vec![
        SecretEntry::new("db", "s3cret", Some("prod DB".into())),
        SecretEntry::new("token", "t0k3n", None),
    ];
    let api_keys = vec![ApiKeyEntry::new(
        "deploy",
        "ef".repeat(32),
        ApiKeyPermissions {
            level: AccessLevel::Restricted,
            allowed_secrets: vec!["db".into()],
            allowed_prefixes: vec![],
            can_list: false,
        },
    )];
    backup::build_payload(&secrets, &api_keys)
}

#[test]
fn v2_archive_roundtrips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("backup.arcavault");

    let payload = sample_payload();
    backup::write_archive(&path, "export-pw", &payload).unwrap();

    let loaded = backup::read_archive(&path, "export-pw").unwrap();
    assert_eq!(loaded.version, backup::CURRENT_VERSION);
    assert_eq!(loaded.secrets.len(), 2);
    assert_eq!(loaded.secrets[0].key, "db");
    assert_eq!(loaded.secrets[0].value, "s3cret");
    assert_eq!(loaded.secrets[0].description.as_deref(), Some("prod DB"));
    assert_eq!(loaded.api_keys.len(), 1);
    assert_eq!(loaded.api_keys[0].name, "deploy");
    assert_eq!(loaded.api_keys[0].access_level, "Restricted");
    assert_eq!(loaded.api_keys[0].allowed_secrets, vec!["db".to_string()]);
    assert!(!loaded.api_keys[0].can_list);
}

#[test]
fn exported_api_keys_carry_no_hashes_or_ids() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("backup.arcavault");
    backup::write_archive(&path, "export-pw", &sample_payload()).unwrap();

    // Decrypt by hand and inspect the raw JSON.
    let loaded = backup::read_archive(&path, "export-pw").unwrap();
    let json = serde_json::to_string(&loaded).unwrap();
    assert!(!json.contains("key_hash"), "hashes must never be exported");
    let key_json = serde_json::to_value(&loaded.api_keys[0]).unwrap();
    assert!(key_json.get("id").is_none(), "ids must never be exported");
}

#[test]
fn wrong_archive_password_is_invalid_password() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("backup.arcavault");
    backup::write_archive(&path, "export-pw", &sample_payload()).unwrap();

    assert!(matches!(
        backup::read_archive(&path, "not-it"),
        Err(ArcaError::InvalidPassword)
    ));
}

#[test]
fn garbage_file_is_not_an_archive() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("backup.arcavault");
    std::fs::write(&path, b"definitely not an archive").unwrap();

    assert!(matches!(
        backup::read_archive(&path, "pw"),
        Err(ArcaError::NotAVault)
    ));
}

#[test]
fn unknown_version_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("backup.arcavault");
    backup::write_archive(&path, "export-pw", &sample_payload()).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[10..14].copy_from_slice(&7i32.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        backup::read_archive(&path, "export-pw"),
        Err(ArcaError::UnsupportedVersion(7))
    ));
}

// ---------------------------------------------------------------------------
// Legacy v1 archives (PBKDF2 key derivation)
// ---------------------------------------------------------------------------

/// Build a v1 archive the way the legacy writer did: PBKDF2 key,
/// AES-GCM over gzip(JSON).
fn write_v1_archive(path: &std::path::Path, password: &str, payload: &ExportPayload) {
    let json = serde_json::to_vec(payload).unwrap();
    let mut encoder =
        flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&json).unwrap();
    let compressed = encoder.finish().unwrap();

    let salt = generate_salt();
    let key = derive_key_pbkdf2(password.as_bytes(), &salt);
    let blob = aead::encrypt(&key, &compressed).unwrap();
    let (nonce, rest) = blob.split_at(NONCE_LEN);
    let (tag, cipher) = rest.split_at(TAG_LEN);

    let mut buf = Vec::new();
    buf.extend_from_slice(b"ARCAEXPORT");
    buf.extend_from_slice(&backup::LEGACY_VERSION.to_le_bytes());
    buf.extend_from_slice(&salt);
    buf.extend_from_slice(nonce);
    buf.extend_from_slice(tag);
    buf.extend_from_slice(&(cipher.len() as i32).to_le_bytes());
    buf.extend_from_slice(cipher);
    std::fs::write(path, buf).unwrap();
}

#[test]
fn v1_archive_imports_with_correct_password() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("legacy.arcavault");

    let mut payload = sample_payload();
    payload.version = backup::LEGACY_VERSION;
    payload.exported_at = Utc::now();
    write_v1_archive(&path, "old-pw", &payload);

    let loaded = backup::read_archive(&path, "old-pw").unwrap();
    assert_eq!(loaded.secrets.len(), 2);
    assert_eq!(loaded.secrets[1].key, "token");
}

#[test]
fn v1_archive_with_wrong_password_is_invalid_password() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("legacy.arcavault");
    write_v1_archive(&path, "old-pw", &sample_payload());

    // Same error shape as v2.
    assert!(matches!(
        backup::read_archive(&path, "wrong"),
        Err(ArcaError::InvalidPassword)
    ));
}
