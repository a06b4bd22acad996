//! The encrypted vault: on-disk container, companion key store, and the
//! in-memory state of an unlocked session.

pub mod format;
pub mod keystore;
pub mod secret;
pub mod state;

pub use format::{VaultMetadata, CURRENT_VERSION};
pub use secret::SecretEntry;
pub use state::{DerivedKey, VaultState};
