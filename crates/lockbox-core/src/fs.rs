//! Filesystem utilities for atomic operations.
//!
//! Every write of the encrypted store and its metadata goes through
//! [`write_atomic`]: the bytes land in a sibling temp file, are synced, and
//! only then renamed over the destination. A crash at any point leaves either
//! the complete old file or the complete new one.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{LockboxError, Result};

/// Infix between the destination file name and the random suffix.
const TEMP_INFIX: &str = ".tmp.";

/// Atomically rename a file, with fallback for platforms where rename fails if target exists.
///
/// On some platforms (notably Windows), `fs::rename` fails if the destination already exists.
/// This function handles that case by removing the destination first and retrying.
///
/// If the rename ultimately fails, the temp file is cleaned up.
pub fn rename_with_fallback(temp_path: &Path, destination: &Path) -> io::Result<()> {
    if let Err(initial_err) = fs::rename(temp_path, destination) {
        let _ = fs::remove_file(destination);
        fs::rename(temp_path, destination).map_err(|retry_err| {
            let _ = fs::remove_file(temp_path);
            io::Error::new(
                retry_err.kind(),
                format!(
                    "Atomic rename failed (initial: {}, retry: {})",
                    initial_err, retry_err
                ),
            )
        })?;
    }
    Ok(())
}

fn temp_prefix(path: &Path) -> Result<(PathBuf, String)> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            LockboxError::PersistenceFailure(format!("Invalid file name: {}", path.display()))
        })?;
    Ok((parent, format!("{}{}", filename, TEMP_INFIX)))
}

/// Bytes written and synced to a temp file, not yet visible at the destination.
///
/// Dropping a `StagedFile` without calling [`StagedFile::commit`] removes the
/// temp file and leaves the destination untouched.
#[derive(Debug)]
pub struct StagedFile {
    temp_path: PathBuf,
    destination: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// Write `data` to a fresh temp file next to `path` and sync it to disk.
    pub fn stage(path: &Path, data: &[u8]) -> Result<Self> {
        let (parent, prefix) = temp_prefix(path)?;
        let temp_path = parent.join(format!("{}{}", prefix, Uuid::new_v4().simple()));

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&temp_path).map_err(|e| {
            LockboxError::PersistenceFailure(format!("Temp file create failed: {}", e))
        })?;

        // From here on the temp file exists; Drop cleans it up on any error.
        let staged = Self {
            temp_path,
            destination: path.to_path_buf(),
            committed: false,
        };

        file.write_all(data).map_err(|e| {
            LockboxError::PersistenceFailure(format!("Temp file write failed: {}", e))
        })?;
        file.sync_all().map_err(|e| {
            LockboxError::PersistenceFailure(format!("Temp file sync failed: {}", e))
        })?;

        Ok(staged)
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Rename the temp file over the destination.
    pub fn commit(mut self) -> Result<()> {
        rename_with_fallback(&self.temp_path, &self.destination)
            .map_err(|e| LockboxError::PersistenceFailure(e.to_string()))?;
        self.committed = true;
        sync_parent_dir(&self.destination);
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

/// Make the rename itself durable. Best effort: not every filesystem allows it.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

/// Replace `path` with `data` atomically.
///
/// # Errors
///
/// Returns `LockboxError::PersistenceFailure` if the temp file cannot be
/// created, written, synced or renamed. `path` is unchanged in that case.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    StagedFile::stage(path, data)?.commit()
}

/// Remove temp files left next to `path` by an interrupted write.
///
/// Returns the number of files removed.
pub fn remove_stale_temp_files(path: &Path) -> Result<usize> {
    let (parent, prefix) = temp_prefix(path)?;
    let entries = match fs::read_dir(&parent) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(&prefix) && fs::remove_file(entry.path()).is_ok() {
            tracing::debug!(file = name, "Removed stale temp file");
            removed += 1;
        }
    }
    Ok(removed)
}
