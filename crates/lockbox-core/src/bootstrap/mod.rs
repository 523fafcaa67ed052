//! Startup classification, legacy migration and the [`Vault`] facade.
//!
//! A data directory holds up to three things:
//!
//! - `store.enc`: the sealed database image
//! - `auth.json`: salt and password verifier ([`AuthMetadata`])
//! - `password_manager.db`: a legacy plaintext database, migrated once
//!
//! [`classify`] looks only at which of these exist; it never decrypts.

mod metadata;
mod migrate;
mod vault;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use metadata::AuthMetadata;
pub use migrate::{legacy_companions, remove_legacy_files};
pub use vault::{Vault, VaultConfig};

/// File name of the sealed database image.
pub const STORE_FILE: &str = "store.enc";

/// File name of the authentication metadata sidecar.
pub const METADATA_FILE: &str = "auth.json";

/// File name of the legacy plaintext database.
pub const LEGACY_FILE: &str = "password_manager.db";

/// Locations of every file a store uses inside its data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub dir: PathBuf,
    pub store: PathBuf,
    pub metadata: PathBuf,
    pub legacy: PathBuf,
}

impl StorePaths {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            store: dir.join(STORE_FILE),
            metadata: dir.join(METADATA_FILE),
            legacy: dir.join(LEGACY_FILE),
            dir,
        }
    }

    pub fn has_store(&self) -> bool {
        self.store.exists()
    }

    pub fn has_metadata(&self) -> bool {
        self.metadata.exists()
    }

    /// True if a plaintext database from an older version is waiting to be migrated.
    pub fn has_legacy(&self) -> bool {
        self.legacy.exists()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// What the store needs before it can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootStatus {
    /// No master password set yet
    FirstRun,
    /// Master password set; waiting for unlock
    NeedsUnlock,
    /// Unlocked and usable
    Ready,
    /// Encrypted data exists but `auth.json` is gone
    MissingMetadata,
    /// Password verified but the store failed to decrypt
    DecryptError,
}

impl std::fmt::Display for BootStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BootStatus::FirstRun => "first-run",
            BootStatus::NeedsUnlock => "needs-unlock",
            BootStatus::Ready => "ready",
            BootStatus::MissingMetadata => "missing-metadata",
            BootStatus::DecryptError => "decrypt-error",
        };
        f.write_str(label)
    }
}

/// Classify a data directory from file presence alone.
///
/// | `store.enc` | `auth.json` | status              |
/// |-------------|-------------|---------------------|
/// | no          | no          | `FirstRun`          |
/// | yes         | yes         | `NeedsUnlock`       |
/// | no          | yes         | `NeedsUnlock`       |
/// | yes         | no          | `MissingMetadata`   |
///
/// Metadata without a store means setup was interrupted before the first
/// flush; unlocking creates the store. A store without metadata is never
/// treated as a first run, so it cannot be overwritten by a new setup.
pub fn classify(paths: &StorePaths) -> BootStatus {
    match (paths.has_store(), paths.has_metadata()) {
        (false, false) => BootStatus::FirstRun,
        (_, true) => BootStatus::NeedsUnlock,
        (true, false) => BootStatus::MissingMetadata,
    }
}
