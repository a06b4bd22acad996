//! Password-based key derivation.
//!
//! Argon2id is the only KDF used for new data.  Its parameters are frozen:
//! vaults written under them must keep deriving the same key forever, so
//! changing any of these constants is a format break, not a tuning knob.
//!
//! PBKDF2-HMAC-SHA256 survives solely to open version-1 export archives.

use argon2::{Algorithm, Argon2, Params, Version};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use crate::errors::{ArcaError, Result};

/// Length of the salt in bytes.
pub const SALT_LEN: usize = 16;

/// Length of the derived key in bytes (256 bits, for AES-256).
const KEY_LEN: usize = 32;

/// Argon2id memory cost in KiB (64 MiB). Frozen for v1 compatibility.
const ARGON2_MEMORY_KIB: u32 = 65_536;

/// Argon2id iteration count. Frozen for v1 compatibility.
const ARGON2_ITERATIONS: u32 = 3;

/// Argon2id parallelism lanes. Frozen for v1 compatibility.
const ARGON2_PARALLELISM: u32 = 4;

/// PBKDF2 iteration count used by version-1 export archives.
const PBKDF2_ITERATIONS: u32 = 100_000;

/// Derive a 32-byte key from a password and salt using Argon2id.
///
/// The same password + salt always produces the same key.
pub fn derive_key(password: &[u8], salt: &[u8]) -> Result<[u8; KEY_LEN]> {
    let params = Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(KEY_LEN),
    )
    .map_err(|e| ArcaError::KeyDerivation(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password, salt, &mut key)
        .map_err(|e| ArcaError::KeyDerivation(format!("Argon2id hashing failed: {e}")))?;

    Ok(key)
}

/// Derive a 32-byte key with PBKDF2-HMAC-SHA256 (100 000 iterations).
///
/// Read-only legacy path for version-1 export archives.  Never used for
/// new data.
pub fn derive_key_pbkdf2(password: &[u8], salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password, salt, PBKDF2_ITERATIONS, &mut key);
    key
}

/// Generate a cryptographically random 16-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}
