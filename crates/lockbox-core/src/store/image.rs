//! Conversion between an in-memory SQLite connection and its serialized image.
//!
//! The image is the exact byte content SQLite would write to a database file.
//! It is what gets sealed into `store.enc` and what export archives carry.

use std::path::Path;
use std::ptr::NonNull;

use chrono::{DateTime, Utc};
use rusqlite::serialize::OwnedData;
use rusqlite::{Connection, DatabaseName, OptionalExtension};
use zeroize::Zeroizing;

use crate::error::{LockboxError, Result};
use crate::store::types::StoreMetadata;

/// Image format version written to the `meta` table.
pub const FORMAT_VERSION: &str = "1";

/// Settings rows that held password material in legacy plaintext databases.
const LEGACY_SECRET_SETTINGS: [&str; 2] = ["master_password_hash", "master_password_salt"];

const BASELINE_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS app_settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        description TEXT,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Create the tables every store carries, and seed `meta` if empty.
///
/// Idempotent: safe on fresh databases and on adopted legacy ones.
pub(crate) fn apply_baseline_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(BASELINE_SCHEMA)?;

    let now = Utc::now().to_rfc3339();
    let mut stmt = conn.prepare("INSERT OR IGNORE INTO meta (key, value) VALUES (?1, ?2)")?;
    stmt.execute(("format_version", FORMAT_VERSION))?;
    stmt.execute(("created_at", &now))?;
    stmt.execute(("last_modified", &now))?;
    Ok(())
}

/// Drop password material a legacy database kept in `app_settings`.
pub(crate) fn purge_legacy_secrets(conn: &Connection) -> Result<usize> {
    let mut removed = 0;
    for key in LEGACY_SECRET_SETTINGS {
        removed += conn.execute("DELETE FROM app_settings WHERE key = ?1", [key])?;
    }
    Ok(removed)
}

pub(crate) fn touch_last_modified(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES ('last_modified', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Serialize the main database into a wipe-on-drop buffer.
pub(crate) fn serialize(conn: &Connection) -> Result<Zeroizing<Vec<u8>>> {
    let data = conn.serialize(DatabaseName::Main)?;
    Ok(Zeroizing::new(data.as_ref().to_vec()))
}

/// Build a fresh in-memory connection holding `bytes` as its main database.
pub(crate) fn load(bytes: &[u8]) -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    let owned_data = owned_data_from_bytes(bytes)?;
    conn.deserialize(DatabaseName::Main, owned_data, false)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    // A blob that decrypts but is not a database fails here, not on first use.
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .map_err(|e| LockboxError::Storage(format!("Decrypted image is not a database: {}", e)))?;

    Ok(conn)
}

/// Fresh in-memory database with the baseline schema.
pub(crate) fn create() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    apply_baseline_schema(&conn)?;
    Ok(conn)
}

/// Read a plaintext database file (any journal mode) into memory.
///
/// A WAL-mode database is checkpointed and switched to rollback journaling
/// first, so the image contains everything committed to the `-wal` file.
pub(crate) fn load_file(path: &Path) -> Result<Connection> {
    let file_conn = Connection::open(path)?;
    let mode: String = file_conn.query_row("PRAGMA journal_mode = DELETE", [], |row| row.get(0))?;
    tracing::debug!(journal_mode = %mode, "Legacy database journal mode reset");

    let image = serialize(&file_conn)?;
    drop(file_conn);
    load(&image)
}

pub(crate) fn read_metadata(conn: &Connection) -> Result<StoreMetadata> {
    let read = |key: &str| -> Result<String> {
        conn.query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?
        .ok_or_else(|| LockboxError::Storage(format!("Missing '{}' in store metadata", key)))
    };
    let parse = |key: &str, value: String| -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| LockboxError::Storage(format!("Invalid {} timestamp: {}", key, e)))
    };

    Ok(StoreMetadata {
        format_version: read("format_version")?,
        created_at: parse("created_at", read("created_at")?)?,
        last_modified: parse("last_modified", read("last_modified")?)?,
    })
}

fn owned_data_from_bytes(bytes: &[u8]) -> Result<OwnedData> {
    if bytes.is_empty() {
        return Err(LockboxError::Storage("SQLite payload is empty".to_string()));
    }

    let size: i32 = bytes
        .len()
        .try_into()
        .map_err(|_| LockboxError::Storage("SQLite payload too large".to_string()))?;

    // SAFETY: sqlite3_malloc returns a valid pointer or null; null is checked
    // immediately. The size has been validated to fit in i32.
    let raw = unsafe { rusqlite::ffi::sqlite3_malloc(size) as *mut u8 };
    if raw.is_null() {
        return Err(LockboxError::Storage("SQLite allocation failed".to_string()));
    }

    // SAFETY:
    // - `raw` was allocated above with exactly `bytes.len()` bytes and is non-null
    // - `bytes` is valid for reads of `bytes.len()` bytes and does not overlap `raw`
    // - `OwnedData::from_raw_nonnull` takes ownership of the sqlite3_malloc'd
    //   buffer, which SQLite frees when the data is dropped or consumed
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), raw, bytes.len());
        let ptr = NonNull::new(raw).ok_or_else(|| {
            LockboxError::Storage("SQLite allocation returned null".to_string())
        })?;
        Ok(OwnedData::from_raw_nonnull(ptr, bytes.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_has_baseline_schema_and_meta() {
        let conn = create().unwrap();
        let meta = read_metadata(&conn).unwrap();
        assert_eq!(meta.format_version, FORMAT_VERSION);
        assert!(meta.last_modified >= meta.created_at);

        conn.execute(
            "INSERT INTO app_settings (key, value) VALUES ('theme', 'dark')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_serialize_load_preserves_rows() {
        let conn = create().unwrap();
        conn.execute_batch(
            "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO items (name) VALUES ('alpha'), ('beta');",
        )
        .unwrap();

        let image = serialize(&conn).unwrap();
        let restored = load(&image).unwrap();

        let count: i64 = restored
            .query_row("SELECT count(*) FROM items", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_load_rejects_garbage() {
        assert!(load(b"").is_err());
        assert!(load(&[0x55u8; 4096]).is_err());
    }

    #[test]
    fn test_baseline_schema_is_idempotent() {
        let conn = create().unwrap();
        let before = read_metadata(&conn).unwrap();
        apply_baseline_schema(&conn).unwrap();
        let after = read_metadata(&conn).unwrap();
        assert_eq!(before.created_at, after.created_at);
    }

    #[test]
    fn test_purge_legacy_secrets() {
        let conn = create().unwrap();
        conn.execute_batch(
            "INSERT INTO app_settings (key, value) VALUES
                ('master_password_hash', 'abc'),
                ('master_password_salt', 'def'),
                ('theme', 'dark');",
        )
        .unwrap();

        assert_eq!(purge_legacy_secrets(&conn).unwrap(), 2);
        let remaining: i64 = conn
            .query_row("SELECT count(*) FROM app_settings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 1);
    }

    #[test]
    fn test_load_file_reads_wal_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            let _: String = conn
                .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
                .unwrap();
            conn.execute_batch(
                "CREATE TABLE entries (id INTEGER PRIMARY KEY, title TEXT);
                 INSERT INTO entries (title) VALUES ('bank'), ('mail');",
            )
            .unwrap();
        }

        let conn = load_file(&path).unwrap();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
