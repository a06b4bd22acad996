//! The in-memory view of an unlocked vault.
//!
//! [`VaultState`] exclusively owns the derived key and the decrypted
//! secrets for the lifetime of a session.  Server workers borrow read
//! views through the surrounding lock; all mutation goes through the
//! session controller.  `lock()` wipes every plaintext byte and is safe
//! to call any number of times.

use std::collections::BTreeMap;

use zeroize::Zeroize;

use crate::apikey::ApiKeyEntry;
use crate::errors::{ArcaError, Result};
use crate::vault::format::VaultMetadata;
use crate::vault::secret::SecretEntry;

/// The 32-byte key derived from the master password.  Zeroed on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct DerivedKey {
    bytes: [u8; 32],
}

impl DerivedKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

/// Runtime state of a vault: `Locked` holds nothing sensitive.
#[derive(Default)]
pub struct VaultState {
    key: Option<DerivedKey>,
    metadata: Option<VaultMetadata>,
    /// Secrets indexed by lowercased key; entries keep their original case.
    secrets: BTreeMap<String, SecretEntry>,
    api_keys: Vec<ApiKeyEntry>,
}

impl VaultState {
    /// A locked, empty state.
    pub fn locked() -> Self {
        Self::default()
    }

    /// Populate the state after a successful decrypt.
    pub fn unlock(
        &mut self,
        key: DerivedKey,
        metadata: VaultMetadata,
        secrets: Vec<SecretEntry>,
        api_keys: Vec<ApiKeyEntry>,
    ) {
        self.lock();
        self.key = Some(key);
        self.metadata = Some(metadata);
        self.secrets = secrets
            .into_iter()
            .map(|s| (s.key.to_lowercase(), s))
            .collect();
        self.api_keys = api_keys;
    }

    /// Wipe the derived key and every secret plaintext.  Idempotent.
    pub fn lock(&mut self) {
        // DerivedKey zeroizes itself on drop.
        self.key = None;
        self.metadata = None;
        for secret in self.secrets.values_mut() {
            secret.value.zeroize();
        }
        self.secrets.clear();
        self.api_keys.clear();
    }

    pub fn is_unlocked(&self) -> bool {
        self.key.is_some()
    }

    /// The derived key, or [`ArcaError::Locked`].
    pub fn derived_key(&self) -> Result<&[u8; 32]> {
        self.key
            .as_ref()
            .map(DerivedKey::as_bytes)
            .ok_or(ArcaError::Locked)
    }

    pub fn metadata(&self) -> Option<&VaultMetadata> {
        self.metadata.as_ref()
    }

    // -----------------------------------------------------------------
    // Secrets
    // -----------------------------------------------------------------

    pub fn secret_count(&self) -> usize {
        self.secrets.len()
    }

    /// Case-insensitive lookup.
    pub fn get_secret(&self, key: &str) -> Option<&SecretEntry> {
        self.secrets.get(&key.to_lowercase())
    }

    pub fn contains_secret(&self, key: &str) -> bool {
        self.secrets.contains_key(&key.to_lowercase())
    }

    /// Insert a new secret.  Fails with [`ArcaError::Duplicate`] if the key
    /// is already taken (case-insensitive).
    pub fn insert_secret(&mut self, entry: SecretEntry) -> Result<()> {
        let index = entry.key.to_lowercase();
        if self.secrets.contains_key(&index) {
            return Err(ArcaError::Duplicate(entry.key));
        }
        self.secrets.insert(index, entry);
        Ok(())
    }

    /// Replace an existing secret's value and description, bumping
    /// `modified_at`.
    pub fn update_secret(
        &mut self,
        key: &str,
        value: String,
        description: Option<String>,
    ) -> Result<()> {
        let entry = self
            .secrets
            .get_mut(&key.to_lowercase())
            .ok_or_else(|| ArcaError::NotFound(key.to_string()))?;
        entry.value.zeroize();
        entry.value = value;
        entry.description = description;
        entry.modified_at = Some(chrono::Utc::now());
        Ok(())
    }

    /// Remove a secret, wiping its plaintext.
    pub fn remove_secret(&mut self, key: &str) -> Result<()> {
        match self.secrets.remove(&key.to_lowercase()) {
            Some(mut entry) => {
                entry.value.zeroize();
                Ok(())
            }
            None => Err(ArcaError::NotFound(key.to_string())),
        }
    }

    /// All secrets in key order, optionally filtered by a case-insensitive
    /// substring of the key.
    pub fn list_secrets(&self, filter: Option<&str>) -> Vec<&SecretEntry> {
        let needle = filter.map(str::to_lowercase);
        self.secrets
            .iter()
            .filter(|(index, _)| match &needle {
                Some(n) if !n.is_empty() => index.contains(n.as_str()),
                _ => true,
            })
            .map(|(_, entry)| entry)
            .collect()
    }

    /// Owned snapshot of every secret, for the save path.
    pub fn secrets_snapshot(&self) -> Vec<SecretEntry> {
        self.secrets.values().cloned().collect()
    }

    // -----------------------------------------------------------------
    // API keys
    // -----------------------------------------------------------------

    pub fn api_keys(&self) -> &[ApiKeyEntry] {
        &self.api_keys
    }

    /// Look up a live key by the hash of its plaintext.  Revoked entries
    /// and imported stubs (empty hash) never match.
    pub fn api_key_by_hash(&self, hash: &str) -> Option<&ApiKeyEntry> {
        if hash.is_empty() {
            return None;
        }
        self.api_keys
            .iter()
            .find(|k| k.is_active && k.key_hash == hash)
    }

    /// Number of live keys; drives the server's `require_auth` mode.
    pub fn active_key_count(&self) -> usize {
        self.api_keys.iter().filter(|k| k.is_active).count()
    }

    pub fn push_api_key(&mut self, entry: ApiKeyEntry) {
        self.api_keys.push(entry);
    }

    /// Replace the whole key set (import path).
    pub fn install_api_keys(&mut self, entries: Vec<ApiKeyEntry>) {
        self.api_keys = entries;
    }

    /// Mark a key revoked.  The entry stays in the store.
    pub fn revoke_api_key(&mut self, id: uuid::Uuid) -> Result<()> {
        let entry = self
            .api_keys
            .iter_mut()
            .find(|k| k.id == id)
            .ok_or_else(|| ArcaError::NotFound(id.to_string()))?;
        entry.is_active = false;
        Ok(())
    }

    /// Stamp `last_used_at` on the key with the given hash.
    pub fn touch_api_key(&mut self, hash: &str) {
        if let Some(entry) = self
            .api_keys
            .iter_mut()
            .find(|k| k.is_active && k.key_hash == hash)
        {
            entry.last_used_at = Some(chrono::Utc::now());
        }
    }
}
