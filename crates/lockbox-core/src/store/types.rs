//! Public data types for the encrypted store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default debounce window between the last mutation and the autosave flush.
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_secs(3);

/// Observable lifecycle state of an [`EncryptedStore`](super::EncryptedStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreState {
    /// No handle and no key in memory
    Closed,
    /// Reading and decrypting the on-disk image
    Opening,
    /// Handle open, in-memory state matches disk
    Unlocked,
    /// Handle open, unsaved mutations pending
    Dirty,
    /// Encrypted image is being written
    Flushing,
    /// Final flush before the handle and key are released
    Locking,
    /// Last open attempt failed to decrypt; open may be retried
    Error,
}

impl StoreState {
    /// True while a handle and session key are held.
    pub fn is_unlocked(self) -> bool {
        matches!(
            self,
            StoreState::Unlocked | StoreState::Dirty | StoreState::Flushing
        )
    }
}

impl std::fmt::Display for StoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StoreState::Closed => "closed",
            StoreState::Opening => "opening",
            StoreState::Unlocked => "unlocked",
            StoreState::Dirty => "dirty",
            StoreState::Flushing => "flushing",
            StoreState::Locking => "locking",
            StoreState::Error => "error",
        };
        f.write_str(label)
    }
}

/// Tunables for an [`EncryptedStore`](super::EncryptedStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Quiet period after the last mutation before an autosave runs.
    pub flush_delay: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            flush_delay: DEFAULT_FLUSH_DELAY,
        }
    }
}

/// Notification sent to subscribers after every flush attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// Encrypted image written; `bytes` is the size of the file on disk.
    FlushCompleted { bytes: usize },
    /// Flush failed; the store stays dirty and will retry on the next mutation.
    FlushFailed { reason: String },
}

/// Result of a single flush request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Image written with this many bytes.
    Written(usize),
    /// Nothing to write.
    Clean,
}

/// Metadata stored inside every database image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Image format version (e.g., "1")
    pub format_version: String,

    /// When this store was created
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last flush
    pub last_modified: DateTime<Utc>,
}
