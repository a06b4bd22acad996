//! AES-256-GCM authenticated encryption.
//!
//! Each call to `encrypt` generates a fresh random 12-byte nonce.  The
//! returned blob carries everything `decrypt` needs to reverse it:
//!
//!   [ 12-byte nonce | 16-byte auth tag | ciphertext ]
//!
//! The tag sits between the nonce and the ciphertext because that is the
//! on-disk payload layout of the vault container and the export archive.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

use crate::errors::{ArcaError, Result};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Size of the AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// Encrypt `plaintext` with a 32-byte `key`.
///
/// Returns `nonce || tag || ciphertext`.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    if key.len() != KEY_LEN {
        return Err(ArcaError::InvalidKeyLength);
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| ArcaError::InvalidKeyLength)?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    // The aead crate appends the tag to the ciphertext; split it back out
    // so the blob can carry the tag up front.
    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| ArcaError::Authentication)?;
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

    let mut output = Vec::with_capacity(NONCE_LEN + TAG_LEN + ciphertext.len());
    output.extend_from_slice(&nonce);
    output.extend_from_slice(tag);
    output.extend_from_slice(ciphertext);
    Ok(output)
}

/// Decrypt a blob produced by `encrypt`.
///
/// Expects `nonce || tag || ciphertext`.  A tag mismatch (wrong key or
/// tampered bytes) surfaces as [`ArcaError::Authentication`].
pub fn decrypt(key: &[u8], blob: &[u8]) -> Result<Vec<u8>> {
    if key.len() != KEY_LEN {
        return Err(ArcaError::InvalidKeyLength);
    }
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(ArcaError::Authentication);
    }

    let (nonce_bytes, rest) = blob.split_at(NONCE_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| ArcaError::InvalidKeyLength)?;

    // Reassemble ciphertext || tag, the order the aead crate verifies in.
    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    cipher
        .decrypt(nonce, sealed.as_slice())
        .map_err(|_| ArcaError::Authentication)
}
