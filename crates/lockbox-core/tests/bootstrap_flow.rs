use std::fs;
use std::time::Duration;

use lockbox_core::crypto::KdfParams;
use lockbox_core::{
    classify, AuthMetadata, BootStatus, LockboxError, StoreConfig, StorePaths, Vault, VaultConfig,
};
use rusqlite::Connection;
use tempfile::tempdir;

const PASSWORD: &str = "correct horse battery";

fn fast_config() -> VaultConfig {
    VaultConfig {
        kdf: KdfParams::new(1024, 1, 1),
        export_kdf: KdfParams::new(2048, 1, 1),
        store: StoreConfig {
            flush_delay: Duration::from_secs(3600),
        },
    }
}

#[test]
fn test_empty_directory_is_first_run() {
    let dir = tempdir().expect("tempdir should succeed");
    let paths = StorePaths::from_dir(dir.path());
    assert_eq!(classify(&paths), BootStatus::FirstRun);
}

#[test]
fn test_store_without_metadata_is_never_overwritten() {
    let dir = tempdir().expect("tempdir should succeed");
    let paths = StorePaths::from_dir(dir.path());
    fs::write(&paths.store, b"opaque encrypted bytes").expect("write should succeed");

    assert_eq!(classify(&paths), BootStatus::MissingMetadata);

    let vault = Vault::new(dir.path(), fast_config()).expect("vault should build");
    assert_eq!(vault.status(), BootStatus::MissingMetadata);
    assert!(matches!(
        vault.setup(PASSWORD),
        Err(LockboxError::InvalidState(_))
    ));
    assert!(matches!(
        vault.unlock(PASSWORD),
        Err(LockboxError::MissingMetadata)
    ));

    assert_eq!(
        fs::read(&paths.store).expect("read should succeed"),
        b"opaque encrypted bytes"
    );
    assert!(!paths.has_metadata());
}

#[test]
fn test_setup_lock_unlock_cycle() {
    let dir = tempdir().expect("tempdir should succeed");
    {
        let vault = Vault::new(dir.path(), fast_config()).expect("vault should build");
        vault.setup(PASSWORD).expect("setup should succeed");
        vault
            .store()
            .with_handle_mut(|db| {
                db.execute(
                    "INSERT INTO app_settings (key, value) VALUES ('theme', 'dark')",
                    [],
                )?;
                Ok(())
            })
            .expect("insert should succeed");
        vault.close().expect("close should succeed");
    }

    let paths = StorePaths::from_dir(dir.path());
    assert_eq!(classify(&paths), BootStatus::NeedsUnlock);

    let vault = Vault::new(dir.path(), fast_config()).expect("vault should build");
    vault.unlock(PASSWORD).expect("unlock should succeed");
    assert_eq!(vault.status(), BootStatus::Ready);

    let theme: String = vault
        .store()
        .with_handle(|db| {
            Ok(db.query_row(
                "SELECT value FROM app_settings WHERE key = 'theme'",
                [],
                |row| row.get(0),
            )?)
        })
        .expect("query should succeed");
    assert_eq!(theme, "dark");
}

#[test]
fn test_metadata_only_unlock_creates_store() {
    let dir = tempdir().expect("tempdir should succeed");
    {
        let vault = Vault::new(dir.path(), fast_config()).expect("vault should build");
        vault.setup(PASSWORD).expect("setup should succeed");
        vault.close().expect("close should succeed");
    }
    let paths = StorePaths::from_dir(dir.path());

    // Crash between writing auth.json and the first flush.
    fs::remove_file(&paths.store).expect("remove should succeed");
    assert_eq!(classify(&paths), BootStatus::NeedsUnlock);

    let vault = Vault::new(dir.path(), fast_config()).expect("vault should build");
    vault.unlock(PASSWORD).expect("unlock should succeed");
    assert!(paths.has_store());
}

#[test]
fn test_verified_password_with_bad_store_is_decrypt_error() {
    let dir = tempdir().expect("tempdir should succeed");
    {
        let vault = Vault::new(dir.path(), fast_config()).expect("vault should build");
        vault.setup(PASSWORD).expect("setup should succeed");
        vault.close().expect("close should succeed");
    }
    let paths = StorePaths::from_dir(dir.path());
    let mut bytes = fs::read(&paths.store).expect("read should succeed");
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    fs::write(&paths.store, &bytes).expect("write should succeed");

    let vault = Vault::new(dir.path(), fast_config()).expect("vault should build");
    assert!(matches!(
        vault.unlock("incorrect horse"),
        Err(LockboxError::WrongPassword)
    ));
    assert_eq!(vault.status(), BootStatus::NeedsUnlock);

    assert!(matches!(
        vault.unlock(PASSWORD),
        Err(LockboxError::CorruptedStore)
    ));
    assert_eq!(vault.status(), BootStatus::DecryptError);
    assert_eq!(fs::read(&paths.store).expect("read should succeed"), bytes);
}

#[test]
fn test_legacy_database_is_migrated_and_removed() {
    let dir = tempdir().expect("tempdir should succeed");
    let paths = StorePaths::from_dir(dir.path());
    {
        let legacy = Connection::open(&paths.legacy).expect("legacy open should succeed");
        let _: String = legacy
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .expect("wal should enable");
        legacy
            .execute_batch(
                "CREATE TABLE app_settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    description TEXT,
                    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
                );
                CREATE TABLE password_entries (id INTEGER PRIMARY KEY, title TEXT);
                INSERT INTO password_entries (title) VALUES ('bank'), ('mail'), ('work');
                INSERT INTO app_settings (key, value) VALUES
                    ('master_password_hash', 'legacy-hash'),
                    ('master_password_salt', 'legacy-salt'),
                    ('theme', 'light');",
            )
            .expect("legacy schema should apply");
    }
    assert!(paths.has_legacy());
    assert_eq!(classify(&paths), BootStatus::FirstRun);

    let vault = Vault::new(dir.path(), fast_config()).expect("vault should build");
    vault.setup(PASSWORD).expect("setup should succeed");

    assert!(!paths.has_legacy());
    for companion in lockbox_core::bootstrap::legacy_companions(&paths.legacy) {
        assert!(!companion.exists(), "{} left behind", companion.display());
    }

    let (entries, secrets, theme) = vault
        .store()
        .with_handle(|db| {
            let entries: i64 =
                db.query_row("SELECT count(*) FROM password_entries", [], |row| row.get(0))?;
            let secrets: i64 = db.query_row(
                "SELECT count(*) FROM app_settings WHERE key LIKE 'master_password_%'",
                [],
                |row| row.get(0),
            )?;
            let theme: String = db.query_row(
                "SELECT value FROM app_settings WHERE key = 'theme'",
                [],
                |row| row.get(0),
            )?;
            Ok((entries, secrets, theme))
        })
        .expect("query should succeed");
    assert_eq!(entries, 3);
    assert_eq!(secrets, 0);
    assert_eq!(theme, "light");
    vault.close().expect("close should succeed");

    let on_disk = fs::read(&paths.store).expect("read should succeed");
    assert!(!on_disk.windows(4).any(|w| w == b"bank"));
}

#[test]
fn test_auth_metadata_file_format() {
    let dir = tempdir().expect("tempdir should succeed");
    let vault = Vault::new(dir.path(), fast_config()).expect("vault should build");
    vault.setup(PASSWORD).expect("setup should succeed");

    let raw = fs::read_to_string(&vault.paths().metadata).expect("read should succeed");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("metadata should be JSON");
    let hash = json["masterPasswordHash"].as_str().expect("hash field");
    let salt = json["salt"].as_str().expect("salt field");
    assert_eq!(hash.len(), 64);
    assert_eq!(salt.len(), 64);

    let metadata = AuthMetadata::load(&vault.paths().metadata)
        .expect("load should succeed")
        .expect("metadata should exist");
    assert!(metadata
        .unlock_key(PASSWORD, &fast_config().kdf)
        .is_ok());
}
