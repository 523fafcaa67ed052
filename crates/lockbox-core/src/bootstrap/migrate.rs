//! One-time migration of a legacy plaintext database.

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::error::Result;
use crate::store::image;

/// Suffixes SQLite appends for journal and shared-memory files.
const COMPANION_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

/// The legacy database file followed by its journal companions.
pub fn legacy_companions(legacy: &Path) -> Vec<PathBuf> {
    let mut paths = vec![legacy.to_path_buf()];
    for suffix in COMPANION_SUFFIXES {
        let mut name = legacy.as_os_str().to_os_string();
        name.push(suffix);
        paths.push(PathBuf::from(name));
    }
    paths
}

/// Delete the legacy database and any companions. Returns how many existed.
pub fn remove_legacy_files(legacy: &Path) -> Result<usize> {
    let mut removed = 0;
    for path in legacy_companions(legacy) {
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(removed)
}

/// Load the legacy database into memory, folding in any WAL content.
pub(crate) fn load_legacy(legacy: &Path) -> Result<Connection> {
    tracing::info!(path = %legacy.display(), "Loading legacy plaintext database");
    image::load_file(legacy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_companion_names() {
        let paths = legacy_companions(Path::new("/data/password_manager.db"));
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "password_manager.db",
                "password_manager.db-wal",
                "password_manager.db-shm",
                "password_manager.db-journal"
            ]
        );
    }

    #[test]
    fn test_remove_legacy_files() {
        let dir = tempdir().unwrap();
        let legacy = dir.path().join("password_manager.db");
        std::fs::write(&legacy, b"x").unwrap();
        std::fs::write(dir.path().join("password_manager.db-wal"), b"x").unwrap();
        std::fs::write(dir.path().join("unrelated.db"), b"x").unwrap();

        assert_eq!(remove_legacy_files(&legacy).unwrap(), 2);
        assert!(!legacy.exists());
        assert!(dir.path().join("unrelated.db").exists());
        assert_eq!(remove_legacy_files(&legacy).unwrap(), 0);
    }
}
