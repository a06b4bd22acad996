//! The session controller.
//!
//! [`Session`] is the single host-facing surface: the GUI (or the CLI
//! binary standing in for it) constructs one at startup and drives every
//! owner operation through it.  It owns the in-memory vault state, the
//! audit pipeline, and the lifecycle of the IPC server.
//!
//! Unlock flow: read the container header, derive the key from the master
//! password and the stored salt, and use the payload's AES-GCM tag as the
//! password check — a mismatch is `InvalidPassword` and the session stays
//! locked.  Lock flow: stop the server, then zeroize the derived key and
//! every secret plaintext, in that order, so no handler can observe a
//! half-wiped state.

use std::sync::{Arc, RwLock};

use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::apikey::{self, ApiKeyEntry, ApiKeyPermissions};
use crate::audit::{AuditEntry, AuditLog, AuditStats};
use crate::backup::{self, ImportOptions, ImportResult};
use crate::config::Settings;
use crate::crypto::kdf;
use crate::errors::{ArcaError, Result};
use crate::server::{ServerContext, VaultServer};
use crate::vault::{format, keystore, DerivedKey, SecretEntry, VaultMetadata, VaultState};

pub struct Session {
    settings: Settings,
    state: Arc<RwLock<VaultState>>,
    audit: AuditLog,
    server: Option<VaultServer>,
    /// The auth mode the running server was started with.
    server_require_auth: bool,
}

impl Session {
    /// Build a locked session.  Opens the audit pipeline immediately so
    /// the restart window is reloaded before any request arrives.
    pub fn new(settings: Settings) -> Result<Self> {
        let audit = AuditLog::open(&settings.audit_dir(), settings.audit_capacity)?;
        Ok(Self {
            settings,
            state: Arc::new(RwLock::new(VaultState::locked())),
            audit,
            server: None,
            server_require_auth: false,
        })
    }

    pub fn is_unlocked(&self) -> bool {
        self.read_state().is_unlocked()
    }

    pub fn secret_count(&self) -> usize {
        self.read_state().secret_count()
    }

    /// Whether a vault container exists at the configured path.
    pub fn vault_exists(&self) -> bool {
        format::exists(&self.settings.vault_path())
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Create a fresh vault protected by `password`, leaving the session
    /// unlocked and serving.
    pub fn create_vault(&mut self, password: &str) -> Result<()> {
        let path = self.settings.vault_path();
        if path.exists() {
            return Err(ArcaError::VaultAlreadyExists(path));
        }

        let metadata = VaultMetadata::generate();
        let key = Zeroizing::new(kdf::derive_key(password.as_bytes(), &metadata.salt)?);
        format::write(&path, &metadata, key.as_ref(), &[])?;
        info!(path = %path.display(), "vault created");

        self.populate_and_serve(DerivedKey::new(*key), metadata, Vec::new(), Vec::new())
    }

    /// Unlock an existing vault.  A wrong password surfaces as
    /// [`ArcaError::InvalidPassword`] and leaves the session locked.
    pub fn unlock(&mut self, password: &str) -> Result<()> {
        let path = self.settings.vault_path();
        let metadata = format::read_metadata(&path)?;

        // The KDF is a deliberately slow, blocking computation; hosts
        // with a UI run `unlock` off their interface thread.
        let key = Zeroizing::new(kdf::derive_key(password.as_bytes(), &metadata.salt)?);

        // Decrypting the payload is the password check.
        let (metadata, secrets) = format::read(&path, key.as_ref())?;
        let api_keys = keystore::read(&self.settings.keys_path(), key.as_ref());

        info!(secrets = secrets.len(), api_keys = api_keys.len(), "vault unlocked");
        self.populate_and_serve(DerivedKey::new(*key), metadata, secrets, api_keys)
    }

    /// Stop serving and wipe all key material and plaintexts.  Idempotent.
    pub fn lock(&mut self) {
        if let Some(mut server) = self.server.take() {
            server.stop();
        }
        self.write_state().lock();
        info!("vault locked");
    }

    /// Lock and shut the audit pipeline down, flushing what remains.
    pub fn close(mut self) {
        self.lock();
        self.audit.shutdown();
    }

    fn populate_and_serve(
        &mut self,
        key: DerivedKey,
        metadata: VaultMetadata,
        secrets: Vec<SecretEntry>,
        api_keys: Vec<ApiKeyEntry>,
    ) -> Result<()> {
        self.write_state().unlock(key, metadata, secrets, api_keys);
        self.start_server()
    }

    fn start_server(&mut self) -> Result<()> {
        let require_auth = self.read_state().active_key_count() > 0;

        let state = Arc::clone(&self.state);
        let keys_path = self.settings.keys_path();
        let on_api_key_used: crate::server::ApiKeyUsedCallback = Arc::new(move |key_hash: &str| {
            let mut state = state.write().expect("vault state lock");
            state.touch_api_key(key_hash);
            // A lock racing in here just loses the stamp.
            if let Ok(key) = state.derived_key() {
                if let Err(e) = keystore::write(&keys_path, key, state.api_keys()) {
                    debug!(error = %e, "failed to persist last_used_at");
                }
            }
        });

        let server = VaultServer::start(
            self.settings.socket_path.clone(),
            ServerContext {
                state: Arc::clone(&self.state),
                audit: self.audit.clone(),
                require_auth,
                on_api_key_used,
            },
        )?;
        self.server = Some(server);
        self.server_require_auth = require_auth;
        Ok(())
    }

    /// Restart the server when the key count crosses the 0↔1 boundary:
    /// the auth mode is part of the request grammar, so a stale mode
    /// would strand every client.
    fn refresh_server_mode(&mut self) -> Result<()> {
        let require_auth = self.read_state().active_key_count() > 0;
        if self.server.is_some() && require_auth != self.server_require_auth {
            if let Some(mut server) = self.server.take() {
                server.stop();
            }
            self.start_server()?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Secrets
    // -----------------------------------------------------------------

    /// Add a new secret.  The key must be unused (case-insensitive).
    pub fn add_secret(
        &mut self,
        key: &str,
        value: &str,
        description: Option<&str>,
    ) -> Result<SecretEntry> {
        let entry = SecretEntry::new(key, value, description.map(String::from));
        let stored = entry.clone();
        self.write_state().insert_secret(entry)?;
        self.save()?;
        Ok(stored)
    }

    /// Replace an existing secret's value and description.
    pub fn update_secret(
        &mut self,
        key: &str,
        value: &str,
        description: Option<&str>,
    ) -> Result<()> {
        self.write_state()
            .update_secret(key, value.to_string(), description.map(String::from))?;
        self.save()
    }

    pub fn delete_secret(&mut self, key: &str) -> Result<()> {
        self.write_state().remove_secret(key)?;
        self.save()
    }

    pub fn get_secret(&self, key: &str) -> Result<SecretEntry> {
        self.read_state()
            .get_secret(key)
            .cloned()
            .ok_or_else(|| ArcaError::NotFound(key.to_string()))
    }

    pub fn list_secrets(&self, filter: Option<&str>) -> Vec<SecretEntry> {
        self.read_state()
            .list_secrets(filter)
            .into_iter()
            .cloned()
            .collect()
    }

    // -----------------------------------------------------------------
    // API keys
    // -----------------------------------------------------------------

    /// Generate a new API key.  Returns the plaintext credential — the
    /// only time it ever exists outside the caller's hands — together
    /// with the stored entry.
    pub fn generate_api_key(
        &mut self,
        name: &str,
        permissions: ApiKeyPermissions,
    ) -> Result<(String, ApiKeyEntry)> {
        permissions.validate()?;

        {
            let state = self.read_state();
            if state
                .api_keys()
                .iter()
                .any(|k| k.name.eq_ignore_ascii_case(name))
            {
                return Err(ArcaError::Duplicate(name.to_string()));
            }
        }

        let plaintext = apikey::generate_key();
        let entry = ApiKeyEntry::new(name, apikey::hash_key(&plaintext), permissions);
        let stored = entry.clone();

        self.write_state().push_api_key(entry);
        self.save_keys()?;
        self.refresh_server_mode()?;

        Ok((plaintext, stored))
    }

    /// Revoke a key by id.  The entry stays in the store, inactive.
    pub fn revoke_api_key(&mut self, id: uuid::Uuid) -> Result<()> {
        self.write_state().revoke_api_key(id)?;
        self.save_keys()?;
        self.refresh_server_mode()
    }

    pub fn list_api_keys(&self) -> Vec<ApiKeyEntry> {
        self.read_state().api_keys().to_vec()
    }

    // -----------------------------------------------------------------
    // Backup
    // -----------------------------------------------------------------

    /// Export the whole vault to a password-protected archive.
    pub fn export(&self, export_password: &str, path: &std::path::Path) -> Result<()> {
        let payload = {
            let state = self.read_state();
            state.derived_key()?; // export requires an unlocked vault
            backup::build_payload(&state.secrets_snapshot(), state.api_keys())
        };
        backup::write_archive(path, export_password, &payload)?;
        info!(path = %path.display(), secrets = payload.secrets.len(), "vault exported");
        Ok(())
    }

    /// Merge an archive into the unlocked vault.
    ///
    /// Colliding secrets are overwritten or skipped per `options`;
    /// colliding key names are always skipped.  Imported API keys are
    /// inactive, hashless stubs until regenerated.
    pub fn import(
        &mut self,
        export_password: &str,
        path: &std::path::Path,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let payload = backup::read_archive(path, export_password)?;
        let mut result = ImportResult::default();

        {
            let mut state = self.write_state();
            state.derived_key()?;

            for secret in payload.secrets {
                if state.contains_secret(&secret.key) {
                    if options.overwrite_existing {
                        state.update_secret(
                            &secret.key,
                            secret.value,
                            secret.description,
                        )?;
                        result.secrets_imported += 1;
                    } else {
                        result.secrets_skipped += 1;
                    }
                } else {
                    let mut entry =
                        SecretEntry::new(secret.key, secret.value, secret.description);
                    entry.created_at = secret.created_at;
                    state.insert_secret(entry)?;
                    result.secrets_imported += 1;
                }
            }

            for exported in payload.api_keys {
                let collides = state
                    .api_keys()
                    .iter()
                    .any(|k| k.name.eq_ignore_ascii_case(&exported.name));
                if collides {
                    result.api_keys_skipped += 1;
                    continue;
                }

                let mut stub = ApiKeyEntry::new(
                    exported.name,
                    String::new(),
                    ApiKeyPermissions {
                        level: apikey::AccessLevel::from_name(&exported.access_level),
                        allowed_secrets: exported.allowed_secrets,
                        allowed_prefixes: Vec::new(),
                        can_list: exported.can_list,
                    },
                );
                stub.description = exported.description;
                stub.created_at = exported.created_at;
                stub.is_active = false;
                state.push_api_key(stub);
                result.api_keys_imported += 1;
            }
        }

        self.save()?;
        info!(
            imported = result.secrets_imported,
            skipped = result.secrets_skipped,
            "archive imported"
        );
        Ok(result)
    }

    // -----------------------------------------------------------------
    // Audit
    // -----------------------------------------------------------------

    /// The most recent `n` audit entries, oldest first.
    pub fn audit_recent(&self, n: usize) -> Vec<AuditEntry> {
        self.audit.recent(n)
    }

    pub fn audit_statistics(&self) -> AuditStats {
        self.audit.statistics()
    }

    /// Force the audit queue to disk (tests and shutdown paths).
    pub fn audit_flush(&self) {
        self.audit.flush();
    }

    // -----------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------

    /// Rewrite the vault container and the key store from live state.
    fn save(&self) -> Result<()> {
        let state = self.read_state();
        let key = state.derived_key()?;
        let metadata = state
            .metadata()
            .ok_or(ArcaError::Locked)?;
        format::write(
            &self.settings.vault_path(),
            metadata,
            key,
            &state.secrets_snapshot(),
        )?;
        keystore::write(&self.settings.keys_path(), key, state.api_keys())
    }

    /// Rewrite only the key store.
    fn save_keys(&self) -> Result<()> {
        let state = self.read_state();
        let key = state.derived_key()?;
        keystore::write(&self.settings.keys_path(), key, state.api_keys())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, VaultState> {
        self.state.read().expect("vault state lock")
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, VaultState> {
        self.state.write().expect("vault state lock")
    }
}
