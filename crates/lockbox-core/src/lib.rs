//! # Lockbox Core
//!
//! Encrypted-at-rest persistence for a local password manager.
//!
//! The database is an in-memory SQLite connection. While unlocked it is
//! queried and mutated directly; on disk there is only an AES-256-GCM sealed
//! image of it, replaced atomically after a debounce window.
//!
//! ## Architecture
//!
//! - **crypto**: Argon2id key derivation, password verifier, AEAD sealing
//! - **fs**: atomic temp-file-and-rename writes
//! - **store**: the [`EncryptedStore`] state machine and autosave thread
//! - **bootstrap**: startup classification, legacy migration, [`Vault`]
//! - **archive**: password-protected export archives

pub mod archive;
pub mod bootstrap;
pub mod crypto;
pub mod error;
pub mod fs;
pub mod store;

pub use bootstrap::{classify, AuthMetadata, BootStatus, StorePaths, Vault, VaultConfig};
pub use crypto::{KdfParams, MasterKey};
pub use error::{LockboxError, Result};
pub use store::{
    EncryptedStore, FlushOutcome, StoreConfig, StoreEvent, StoreHandle, StoreMetadata, StoreState,
};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
