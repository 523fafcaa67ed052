//! Application context for the Lockbox CLI.
//!
//! Combines CLI arguments with the lazily-loaded config file.

use std::path::PathBuf;

use once_cell::unsync::OnceCell;
use zeroize::Zeroizing;

use lockbox_core::Vault;

use crate::cli::Cli;
use crate::config::{default_data_dir, read_config, LockboxConfig};

use super::resolver::resolve_config_path;
use super::unlock::unlock_vault;

/// Application context that bundles CLI args with configuration.
pub struct AppContext<'a> {
    cli: &'a Cli,
    config: OnceCell<LockboxConfig>,
}

impl<'a> AppContext<'a> {
    /// Create a new application context from CLI arguments.
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            config: OnceCell::new(),
        }
    }

    /// Check if quiet mode is enabled.
    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    /// Check if prompts are disabled.
    pub fn no_input(&self) -> bool {
        self.cli.no_input
    }

    /// Get the configuration, loading it lazily. A missing file means defaults.
    pub fn config(&self) -> anyhow::Result<&LockboxConfig> {
        self.config.get_or_try_init(|| {
            let path = resolve_config_path()?;
            if !path.exists() {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(LockboxConfig::default());
            }
            read_config(&path)
        })
    }

    /// Data directory: `--dir`/LOCKBOX_DIR, then config, then the XDG data dir.
    pub fn data_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = self.cli.dir.as_deref() {
            return Ok(PathBuf::from(dir));
        }
        if let Some(dir) = self.config()?.store.dir.as_deref() {
            return Ok(PathBuf::from(dir));
        }
        default_data_dir()
    }

    /// Build a locked vault over the data directory.
    pub fn vault(&self) -> anyhow::Result<Vault> {
        let dir = self.data_dir()?;
        let vault = Vault::new(dir, self.config()?.vault_config())?;
        Ok(vault)
    }

    /// Build a vault and unlock it, prompting for the master password.
    pub fn unlock(&self) -> anyhow::Result<(Vault, Zeroizing<String>)> {
        let vault = self.vault()?;
        let password = unlock_vault(&vault, self.no_input())?;
        Ok((vault, password))
    }
}
