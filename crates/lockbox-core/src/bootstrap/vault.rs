//! The `Vault`: metadata, key derivation and the encrypted store in one place.

use std::sync::atomic::{AtomicBool, Ordering};

use zeroize::Zeroizing;

use super::metadata::AuthMetadata;
use super::migrate::{load_legacy, remove_legacy_files};
use super::{classify, BootStatus, StorePaths};
use crate::archive;
use crate::crypto::{derive_key, validate_master_password, KdfParams, MasterKey, Salt};
use crate::error::{LockboxError, Result};
use crate::store::{EncryptedStore, StoreConfig};

/// Tunables for a [`Vault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultConfig {
    /// Parameters for the unlock key. Must not change after setup.
    pub kdf: KdfParams,
    /// Parameters for export archive keys.
    pub export_kdf: KdfParams,
    pub store: StoreConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf: KdfParams::unlock(),
            export_kdf: KdfParams::export(),
            store: StoreConfig::default(),
        }
    }
}

/// Entry point for a data directory.
///
/// ```no_run
/// use lockbox_core::{BootStatus, Vault, VaultConfig};
///
/// # fn main() -> lockbox_core::Result<()> {
/// let vault = Vault::new("/tmp/lockbox", VaultConfig::default())?;
/// match vault.status() {
///     BootStatus::FirstRun => vault.setup("correct horse battery")?,
///     BootStatus::NeedsUnlock => vault.unlock("correct horse battery")?,
///     other => eprintln!("cannot continue: {}", other),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Vault {
    paths: StorePaths,
    config: VaultConfig,
    store: EncryptedStore,
    decrypt_failed: AtomicBool,
}

impl Vault {
    pub fn new(dir: impl Into<std::path::PathBuf>, config: VaultConfig) -> Result<Self> {
        let paths = StorePaths::from_dir(dir);
        let store = EncryptedStore::new(paths.store.clone(), config.store)?;
        Ok(Self {
            paths,
            config,
            store,
            decrypt_failed: AtomicBool::new(false),
        })
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// The underlying store. Usable once [`BootStatus::Ready`].
    pub fn store(&self) -> &EncryptedStore {
        &self.store
    }

    pub fn status(&self) -> BootStatus {
        if self.store.state().is_unlocked() {
            return BootStatus::Ready;
        }
        if self.decrypt_failed.load(Ordering::SeqCst) {
            return BootStatus::DecryptError;
        }
        classify(&self.paths)
    }

    /// Set the master password on a fresh directory and create the store.
    ///
    /// `auth.json` is written before the store. If a legacy plaintext
    /// database is present it becomes the store's content and is then deleted.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the status is `FirstRun`; `InvalidInput` if the
    /// password fails policy.
    pub fn setup(&self, password: &str) -> Result<()> {
        match self.status() {
            BootStatus::FirstRun => {}
            BootStatus::Ready => return Err(LockboxError::AlreadyUnlocked),
            other => {
                return Err(LockboxError::InvalidState(format!(
                    "Setup requires a first run (status: {})",
                    other
                )))
            }
        }
        validate_master_password(password)?;

        std::fs::create_dir_all(&self.paths.dir)?;
        let salt = Salt::generate()?;
        let key = derive_key(password, salt.as_bytes(), &self.config.kdf)?;
        AuthMetadata::for_key(&key, &salt).save(&self.paths.metadata)?;
        tracing::info!(dir = %self.paths.dir.display(), "Master password set");

        self.open_or_migrate(key)
    }

    /// Verify `password` and open the store.
    ///
    /// # Errors
    ///
    /// - `MissingMetadata` if the store exists without `auth.json`
    /// - `WrongPassword` on verifier mismatch
    /// - `CorruptedStore` if the password verifies but the store does not
    ///   decrypt (status becomes `DecryptError`)
    pub fn unlock(&self, password: &str) -> Result<()> {
        if self.store.state().is_unlocked() {
            return Err(LockboxError::AlreadyUnlocked);
        }
        let metadata = self.load_metadata()?;
        let key = metadata.unlock_key(password, &self.config.kdf)?;
        self.open_or_migrate(key)
    }

    fn load_metadata(&self) -> Result<AuthMetadata> {
        match AuthMetadata::load(&self.paths.metadata)? {
            Some(metadata) => Ok(metadata),
            None if self.paths.has_store() => Err(LockboxError::MissingMetadata),
            None => Err(LockboxError::InvalidState(
                "No master password has been set".to_string(),
            )),
        }
    }

    fn open_or_migrate(&self, key: MasterKey) -> Result<()> {
        if !self.paths.has_store() && self.paths.has_legacy() {
            let conn = load_legacy(&self.paths.legacy)?;
            self.store.adopt(key, conn)?;
            let removed = remove_legacy_files(&self.paths.legacy)?;
            tracing::info!(files = removed, "Legacy plaintext database migrated and removed");
            self.decrypt_failed.store(false, Ordering::SeqCst);
            return Ok(());
        }

        match self.store.open(key) {
            Ok(()) => {
                self.decrypt_failed.store(false, Ordering::SeqCst);
                Ok(())
            }
            Err(e) if e.is_decryption_failure() || matches!(e, LockboxError::CorruptedStore) => {
                tracing::error!(error = %e, "Password verified but the store failed to decrypt");
                self.decrypt_failed.store(true, Ordering::SeqCst);
                Err(LockboxError::CorruptedStore)
            }
            Err(e) => Err(e),
        }
    }

    /// Check `password` against `auth.json` without touching the store.
    pub fn verify_password(&self, password: &str) -> Result<bool> {
        let metadata = self.load_metadata()?;
        match metadata.unlock_key(password, &self.config.kdf) {
            Ok(_) => Ok(true),
            Err(LockboxError::WrongPassword) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn lock(&self) -> Result<()> {
        self.store.lock()
    }

    pub fn close(&self) -> Result<()> {
        self.store.close()
    }

    /// Seal the current database into an export archive.
    ///
    /// The master password is re-verified and used as the archive password,
    /// with a key from the export KDF profile.
    pub fn export_archive(&self, password: &str) -> Result<Vec<u8>> {
        if !self.verify_password(password)? {
            return Err(LockboxError::WrongPassword);
        }
        let image = self.store.export_image()?;
        let archive = archive::seal_archive(&image, password, &self.config.export_kdf)?;
        tracing::info!(bytes = archive.len(), "Export archive created");
        Ok(archive)
    }

    /// Decrypt an export archive back into a plaintext database image.
    pub fn read_archive(bytes: &[u8], password: &str) -> Result<Zeroizing<Vec<u8>>> {
        archive::open_archive(bytes, password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn fast() -> VaultConfig {
        VaultConfig {
            kdf: KdfParams::new(1024, 1, 1),
            export_kdf: KdfParams::new(2048, 1, 1),
            store: StoreConfig {
                flush_delay: Duration::from_secs(3600),
            },
        }
    }

    #[test]
    fn test_setup_then_ready() {
        let dir = tempdir().unwrap();
        let vault = Vault::new(dir.path().join("data"), fast()).unwrap();

        assert_eq!(vault.status(), BootStatus::FirstRun);
        vault.setup("correct horse battery").unwrap();
        assert_eq!(vault.status(), BootStatus::Ready);
        assert!(vault.paths().has_metadata());
        assert!(vault.paths().has_store());
    }

    #[test]
    fn test_setup_rejects_weak_password() {
        let dir = tempdir().unwrap();
        let vault = Vault::new(dir.path(), fast()).unwrap();

        assert!(matches!(
            vault.setup("short"),
            Err(LockboxError::InvalidInput(_))
        ));
        assert!(!vault.paths().has_metadata());
        assert_eq!(vault.status(), BootStatus::FirstRun);
    }

    #[test]
    fn test_setup_twice_rejected() {
        let dir = tempdir().unwrap();
        let vault = Vault::new(dir.path(), fast()).unwrap();
        vault.setup("correct horse battery").unwrap();
        vault.lock().unwrap();

        assert_eq!(vault.status(), BootStatus::NeedsUnlock);
        assert!(matches!(
            vault.setup("another password"),
            Err(LockboxError::InvalidState(_))
        ));
    }

    #[test]
    fn test_unlock_wrong_password() {
        let dir = tempdir().unwrap();
        let vault = Vault::new(dir.path(), fast()).unwrap();
        vault.setup("correct horse battery").unwrap();
        vault.lock().unwrap();

        assert!(matches!(
            vault.unlock("incorrect horse"),
            Err(LockboxError::WrongPassword)
        ));
        assert_eq!(vault.status(), BootStatus::NeedsUnlock);
        vault.unlock("correct horse battery").unwrap();
        assert_eq!(vault.status(), BootStatus::Ready);
    }

    #[test]
    fn test_verify_password() {
        let dir = tempdir().unwrap();
        let vault = Vault::new(dir.path(), fast()).unwrap();
        vault.setup("correct horse battery").unwrap();

        assert!(vault.verify_password("correct horse battery").unwrap());
        assert!(!vault.verify_password("incorrect horse").unwrap());
    }

    #[test]
    fn test_export_requires_master_password() {
        let dir = tempdir().unwrap();
        let vault = Vault::new(dir.path(), fast()).unwrap();
        vault.setup("correct horse battery").unwrap();

        assert!(matches!(
            vault.export_archive("incorrect horse"),
            Err(LockboxError::WrongPassword)
        ));
        let archive = vault.export_archive("correct horse battery").unwrap();
        let image = Vault::read_archive(&archive, "correct horse battery").unwrap();
        assert!(image.starts_with(b"SQLite format 3\0"));
    }
}
