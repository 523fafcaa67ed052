//! Error types for Lockbox core operations.
//!
//! Cryptographic and state errors are kept distinct so callers can tell a
//! wrong password from a damaged store without inspecting messages. The CLI
//! layer maps these to user-facing messages and exit codes.

use thiserror::Error;

/// Result type alias for Lockbox operations.
pub type Result<T> = std::result::Result<T, LockboxError>;

/// Core error type for Lockbox operations.
#[derive(Debug, Error)]
pub enum LockboxError {
    /// Master password did not match the stored verification hash
    #[error("Incorrect master password")]
    WrongPassword,

    /// AEAD tag mismatch: wrong key or tampered data
    #[error("Authentication failed: wrong key or tampered data")]
    AuthenticationFailure,

    /// Blob or file framing is invalid (too short, bad header)
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Disk write, sync or rename failed
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// Encrypted data exists but the verification metadata is gone
    #[error("Encrypted store exists but its authentication metadata is missing")]
    MissingMetadata,

    /// Password verified but the encrypted store could not be decrypted
    #[error("Encrypted store is corrupted and cannot be decrypted")]
    CorruptedStore,

    /// Lock requested while the store is not unlocked
    #[error("Store is already locked")]
    AlreadyLocked,

    /// Operation requires an unlocked store
    #[error("Store is not unlocked")]
    NotUnlocked,

    /// Open requested while a session is already active
    #[error("Store is already unlocked")]
    AlreadyUnlocked,

    /// Operation is not valid in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Key derivation or cipher setup error
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage backend error (generic)
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl From<std::io::Error> for LockboxError {
    fn from(err: std::io::Error) -> Self {
        LockboxError::PersistenceFailure(err.to_string())
    }
}

impl LockboxError {
    /// True for failures that stem from the AEAD layer rejecting a blob.
    pub fn is_decryption_failure(&self) -> bool {
        matches!(
            self,
            LockboxError::AuthenticationFailure | LockboxError::MalformedInput(_)
        )
    }
}
