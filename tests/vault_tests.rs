//! Integration tests for the vault container and the API-key store.

use arca::apikey::{ApiKeyEntry, ApiKeyPermissions};
use arca::crypto::{derive_key, KEY_LEN};
use arca::errors::ArcaError;
use arca::vault::format::{self, VaultMetadata};
use arca::vault::keystore;
use arca::vault::SecretEntry;
use tempfile::TempDir;

fn sample_secrets() -> Vec<SecretEntry> {
    vec![
        SecretEntry::new("db", "s3cret", Some("prod DB".into())),
        SecretEntry::new("api-token", "", None),
    ]
}

// ---------------------------------------------------------------------------
// Container round-trip
// ---------------------------------------------------------------------------

#[test]
fn write_read_roundtrip_preserves_secrets() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.vlt");
    let meta = VaultMetadata::generate();
    let key = derive_key(b"correct horse battery staple", &meta.salt).unwrap();

    let secrets = sample_secrets();
    format::write(&path, &meta, &key, &secrets).unwrap();

    let (loaded_meta, loaded) = format::read(&path, &key).unwrap();
    assert_eq!(loaded_meta.version, meta.version);
    assert_eq!(loaded_meta.salt, meta.salt);
    assert_eq!(loaded_meta.created_at, meta.created_at);

    assert_eq!(loaded.len(), secrets.len());
    for (a, b) in loaded.iter().zip(&secrets) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.key, b.key);
        assert_eq!(a.value, b.value);
        assert_eq!(a.description, b.description);
        assert_eq!(a.created_at, b.created_at);
    }
}

#[test]
fn empty_vault_roundtrips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.vlt");
    let meta = VaultMetadata::generate();
    let key = [0x42u8; KEY_LEN];

    format::write(&path, &meta, &key, &[]).unwrap();
    let (_, loaded) = format::read(&path, &key).unwrap();
    assert!(loaded.is_empty());
}

#[test]
fn wrong_password_is_invalid_password_not_corrupt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.vlt");
    let meta = VaultMetadata::generate();
    let key = derive_key(b"right password!", &meta.salt).unwrap();
    format::write(&path, &meta, &key, &sample_secrets()).unwrap();

    let wrong = derive_key(b"wrong password!", &meta.salt).unwrap();
    assert!(matches!(
        format::read(&path, &wrong),
        Err(ArcaError::InvalidPassword)
    ));
}

#[test]
fn mutated_magic_is_not_a_vault() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.vlt");
    let meta = VaultMetadata::generate();
    let key = [0x07u8; KEY_LEN];
    format::write(&path, &meta, &key, &[]).unwrap();

    let original = std::fs::read(&path).unwrap();
    for index in 0..4 {
        let mut bytes = original.clone();
        bytes[index] ^= 0x01;
        std::fs::write(&path, &bytes).unwrap();
        assert!(
            matches!(format::read(&path, &key), Err(ArcaError::NotAVault)),
            "magic byte {index} mutation must yield NotAVault"
        );
    }
}

#[test]
fn truncated_header_is_not_a_vault() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.vlt");
    std::fs::write(&path, b"ARCA\x01\x00").unwrap();
    assert!(matches!(
        format::read(&path, &[0u8; KEY_LEN]),
        Err(ArcaError::NotAVault)
    ));
}

#[test]
fn future_version_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.vlt");
    let meta = VaultMetadata::generate();
    let key = [0x07u8; KEY_LEN];
    format::write(&path, &meta, &key, &[]).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        format::read(&path, &key),
        Err(ArcaError::UnsupportedVersion(99))
    ));
}

#[test]
fn truncated_payload_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.vlt");
    let meta = VaultMetadata::generate();
    let key = [0x07u8; KEY_LEN];
    format::write(&path, &meta, &key, &sample_secrets()).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    bytes.truncate(bytes.len() - 3);
    std::fs::write(&path, &bytes).unwrap();

    assert!(matches!(format::read(&path, &key), Err(ArcaError::Corrupt(_))));
}

#[test]
fn missing_file_is_vault_not_found() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nope.vlt");
    assert!(matches!(
        format::read_metadata(&path),
        Err(ArcaError::VaultNotFound(_))
    ));
}

#[test]
fn metadata_is_readable_without_a_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.vlt");
    let meta = VaultMetadata::generate();
    format::write(&path, &meta, &[0x55u8; KEY_LEN], &[]).unwrap();

    let loaded = format::read_metadata(&path).unwrap();
    assert_eq!(loaded.salt, meta.salt);
    assert_eq!(loaded.version, meta.version);
}

// ---------------------------------------------------------------------------
// API-key store
// ---------------------------------------------------------------------------

#[test]
fn keystore_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.keys");
    let key = [0x33u8; KEY_LEN];

    let entries = vec![ApiKeyEntry::new(
        "ci",
        "ab".repeat(32),
        ApiKeyPermissions::full(),
    )];
    keystore::write(&path, &key, &entries).unwrap();

    let loaded = keystore::read(&path, &key);
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].name, "ci");
    assert_eq!(loaded[0].key_hash, entries[0].key_hash);
    assert!(loaded[0].is_active);
}

#[test]
fn missing_keystore_yields_empty_set() {
    let dir = TempDir::new().unwrap();
    let loaded = keystore::read(&dir.path().join("vault.keys"), &[0u8; KEY_LEN]);
    assert!(loaded.is_empty());
}

#[test]
fn corrupt_keystore_yields_empty_set() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.keys");
    std::fs::write(&path, b"\xff\xff\xff\xffgarbage").unwrap();
    assert!(keystore::read(&path, &[0u8; KEY_LEN]).is_empty());
}

#[test]
fn keystore_under_wrong_key_yields_empty_set() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault.keys");
    let entries = vec![ApiKeyEntry::new("ci", "cd".repeat(32), ApiKeyPermissions::full())];
    keystore::write(&path, &[0x01u8; KEY_LEN], &entries).unwrap();

    assert!(keystore::read(&path, &[0x02u8; KEY_LEN]).is_empty());
}
