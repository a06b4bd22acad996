//! The secret record stored inside a vault.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single named secret.
///
/// `key` is unique within the vault, compared case-insensitively.  The
/// plaintext `value` only ever exists in memory while the vault is
/// unlocked; on disk the whole record set is one encrypted payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretEntry {
    /// Opaque 128-bit identifier.
    pub id: Uuid,

    /// The secret's name (e.g. "db-password"). Case-insensitively unique.
    pub key: String,

    /// The secret value. May be empty.
    pub value: String,

    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// When this secret was first created.
    pub created_at: DateTime<Utc>,

    /// When this secret was last updated, if ever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl SecretEntry {
    /// Create a fresh entry with a random id and the current timestamp.
    pub fn new(key: impl Into<String>, value: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            value: value.into(),
            description,
            created_at: Utc::now(),
            modified_at: None,
        }
    }
}
