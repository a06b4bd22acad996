//! Cryptographic primitives: authenticated encryption and key derivation.

pub mod aead;
pub mod kdf;

pub use aead::{decrypt, encrypt, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use kdf::{derive_key, derive_key_pbkdf2, generate_salt, SALT_LEN};
