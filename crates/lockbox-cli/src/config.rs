use std::path::{Path, PathBuf};
use std::time::Duration;

use lockbox_core::{KdfParams, StoreConfig, VaultConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LockboxConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub autosave: AutosaveSection,
    #[serde(default)]
    pub security: SecuritySection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreSection {
    pub dir: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveSection {
    pub flush_delay_ms: u64,
}

impl Default for AutosaveSection {
    fn default() -> Self {
        Self {
            flush_delay_ms: StoreConfig::default().flush_delay.as_millis() as u64,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    pub kdf_memory_kib: u32,
    pub kdf_time_cost: u32,
}

impl Default for SecuritySection {
    fn default() -> Self {
        let unlock = KdfParams::unlock();
        Self {
            kdf_memory_kib: unlock.memory_kib,
            kdf_time_cost: unlock.time_cost,
        }
    }
}

impl LockboxConfig {
    pub fn new(dir: &Path) -> Self {
        Self {
            store: StoreSection {
                dir: Some(dir.to_string_lossy().to_string()),
            },
            ..Self::default()
        }
    }

    /// Core configuration. KDF costs below the unlock profile are raised to it.
    pub fn vault_config(&self) -> VaultConfig {
        let unlock = KdfParams::unlock();
        if self.security.kdf_memory_kib < unlock.memory_kib
            || self.security.kdf_time_cost < unlock.time_cost
        {
            tracing::warn!(
                memory_kib = self.security.kdf_memory_kib,
                time_cost = self.security.kdf_time_cost,
                "Configured KDF cost is below the minimum; using the minimum instead"
            );
        }
        VaultConfig {
            kdf: KdfParams::new(
                self.security.kdf_memory_kib.max(unlock.memory_kib),
                self.security.kdf_time_cost.max(unlock.time_cost),
                unlock.parallelism,
            ),
            export_kdf: KdfParams::export(),
            store: StoreConfig {
                flush_delay: Duration::from_millis(self.autosave.flush_delay_ms),
            },
        }
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_data_dir() -> anyhow::Result<PathBuf> {
    xdg_data_dir()
}

pub fn read_config(path: &Path) -> anyhow::Result<LockboxConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn write_config(path: &Path, config: &LockboxConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("lockbox"));
        }
    }
    Ok(home_dir()?.join(".config").join("lockbox"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("lockbox"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("lockbox"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}
