//! Path resolution for the config file and data directory.

use std::path::{Path, PathBuf};

use crate::config::default_config_path;
use crate::constants::CONFIG_ENV;

/// Resolve the config file path, checking LOCKBOX_CONFIG env var first.
pub fn resolve_config_path() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var(CONFIG_ENV) {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    default_config_path()
}

/// Error message when no store has been set up in `dir`.
pub fn missing_store_message(dir: &Path) -> String {
    format!(
        "No lockbox found in {}\n\nRun:\n  lockbox init\n\nOr specify a data directory:\n  LOCKBOX_DIR=/path/to/dir lockbox init",
        dir.display()
    )
}
