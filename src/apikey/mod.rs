//! API key data model, generation, and hashing.
//!
//! A client credential is the string `arca_` followed by the URL-safe
//! base64 (no padding) of 32 random bytes.  The plaintext is handed out
//! exactly once, at generation time; only its lowercase-hex SHA-256 is
//! ever persisted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::{ArcaError, Result};

/// Prefix carried by every generated key string.
pub const KEY_PREFIX: &str = "arca_";

/// Number of random bytes behind each key.
const KEY_RANDOM_LEN: usize = 32;

/// How much of the vault an API key may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessLevel {
    /// Every secret, every action.
    Full,
    /// Only the secrets named by `allowed_secrets` / `allowed_prefixes`.
    Restricted,
    /// Legacy level. Enforced identically to `Restricted`.
    ReadOnly,
}

impl AccessLevel {
    /// Parse the string form used by export archives ("Full", "Restricted",
    /// "ReadOnly"). Unknown values fall back to `Restricted`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Full" => Self::Full,
            "ReadOnly" => Self::ReadOnly,
            _ => Self::Restricted,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Full => "Full",
            Self::Restricted => "Restricted",
            Self::ReadOnly => "ReadOnly",
        }
    }
}

/// The permission set attached to an API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyPermissions {
    pub level: AccessLevel,

    /// Secret keys this key may read (case-insensitive match).
    #[serde(default)]
    pub allowed_secrets: Vec<String>,

    /// Secret-key prefixes this key may read. A trailing `*` is accepted
    /// and ignored for matching.
    #[serde(default)]
    pub allowed_prefixes: Vec<String>,

    /// Whether this key may enumerate secret names.
    #[serde(default)]
    pub can_list: bool,
}

impl ApiKeyPermissions {
    /// Permissions for a `Full` key: everything, including listing.
    pub fn full() -> Self {
        Self {
            level: AccessLevel::Full,
            allowed_secrets: Vec::new(),
            allowed_prefixes: Vec::new(),
            can_list: true,
        }
    }

    /// A `Restricted` key must name at least one secret or prefix —
    /// an empty permission set can never be satisfied.
    pub fn validate(&self) -> Result<()> {
        match self.level {
            AccessLevel::Full => Ok(()),
            AccessLevel::Restricted | AccessLevel::ReadOnly => {
                if self.allowed_secrets.is_empty() && self.allowed_prefixes.is_empty() {
                    Err(ArcaError::InvalidPermissions(
                        "a restricted key needs at least one allowed secret or prefix".into(),
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// A stored API key.  The plaintext credential is never part of this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    /// Opaque 128-bit identifier.
    pub id: Uuid,

    /// Human-readable name, case-insensitively unique in the store.
    pub name: String,

    /// Lowercase hex SHA-256 of the full key string (64 chars). Empty for
    /// imported stubs awaiting regeneration.
    pub key_hash: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,

    /// Revoked or stub keys stay in the store with `is_active = false`.
    pub is_active: bool,

    pub permissions: ApiKeyPermissions,
}

impl ApiKeyEntry {
    /// Build an active entry for a freshly generated key.
    pub fn new(name: impl Into<String>, key_hash: String, permissions: ApiKeyPermissions) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            key_hash,
            description: None,
            created_at: Utc::now(),
            last_used_at: None,
            is_active: true,
            permissions,
        }
    }
}

/// Generate a fresh plaintext API key: `arca_` + URL-safe base64 of 32
/// random bytes, no padding.
pub fn generate_key() -> String {
    let mut bytes = [0u8; KEY_RANDOM_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("{KEY_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a key string for storage: lowercase hex SHA-256 over the exact
/// UTF-8 bytes, prefix included.
pub fn hash_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_carry_prefix_and_decode() {
        let key = generate_key();
        assert!(key.starts_with(KEY_PREFIX));

        let decoded = URL_SAFE_NO_PAD
            .decode(&key[KEY_PREFIX.len()..])
            .expect("key body must be URL-safe base64");
        assert_eq!(decoded.len(), KEY_RANDOM_LEN);
    }

    #[test]
    fn generated_keys_are_unique() {
        assert_ne!(generate_key(), generate_key());
    }

    #[test]
    fn hash_is_lowercase_hex_sha256() {
        let hash = hash_key("arca_test");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        // Known digest of the literal "arca_test".
        assert_eq!(hash, hash_key("arca_test"));
        assert_ne!(hash, hash_key("arca_test2"));
    }

    #[test]
    fn restricted_permissions_must_name_something() {
        let empty = ApiKeyPermissions {
            level: AccessLevel::Restricted,
            allowed_secrets: vec![],
            allowed_prefixes: vec![],
            can_list: false,
        };
        assert!(empty.validate().is_err());

        let with_secret = ApiKeyPermissions {
            allowed_secrets: vec!["db".into()],
            ..empty.clone()
        };
        assert!(with_secret.validate().is_ok());

        let with_prefix = ApiKeyPermissions {
            allowed_prefixes: vec!["prod/".into()],
            ..empty
        };
        assert!(with_prefix.validate().is_ok());
    }

    #[test]
    fn full_permissions_always_validate() {
        assert!(ApiKeyPermissions::full().validate().is_ok());
    }

    #[test]
    fn access_level_round_trips_through_names() {
        for level in [AccessLevel::Full, AccessLevel::Restricted, AccessLevel::ReadOnly] {
            assert_eq!(AccessLevel::from_name(level.name()), level);
        }
        assert_eq!(AccessLevel::from_name("garbage"), AccessLevel::Restricted);
    }
}
