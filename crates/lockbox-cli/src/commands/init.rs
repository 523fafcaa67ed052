use lockbox_core::crypto::{password_strength, StrengthLevel};
use lockbox_core::BootStatus;

use crate::app::{resolve_config_path, AppContext};
use crate::config::{write_config, LockboxConfig};
use crate::errors::CliError;
use crate::helpers::prompt_new_password;

pub fn handle_init(ctx: &AppContext) -> anyhow::Result<()> {
    let vault = ctx.vault()?;
    let dir = vault.paths().dir().to_path_buf();

    match vault.status() {
        BootStatus::FirstRun => {}
        BootStatus::MissingMetadata => {
            return Err(CliError::integrity_failed(
                format!("{} holds an encrypted store without auth.json", dir.display()),
                "Hint: Restore auth.json from a backup. `init` never overwrites an existing store.",
            )
            .into())
        }
        _ => {
            return Err(CliError::invalid_input(format!(
                "Lockbox already initialized in {}",
                dir.display()
            ))
            .into())
        }
    }

    let migrating = vault.paths().has_legacy();
    let password = prompt_new_password(ctx.no_input())?;
    let level = StrengthLevel::from_score(password_strength(&password));
    if level == StrengthLevel::Weak && !ctx.quiet() {
        eprintln!("Warning: the master password is weak. Consider a longer mix of letters, digits and symbols.");
    }
    vault.setup(&password)?;
    vault.close()?;

    // Pin the KDF cost used at setup; unlocking needs the same parameters.
    let config_path = resolve_config_path()?;
    if !config_path.exists() {
        let mut config = LockboxConfig::new(&dir);
        let kdf = vault.config().kdf;
        config.security.kdf_memory_kib = kdf.memory_kib;
        config.security.kdf_time_cost = kdf.time_cost;
        write_config(&config_path, &config)?;
        tracing::debug!(path = %config_path.display(), "wrote config");
    }

    if !ctx.quiet() {
        if migrating {
            println!("Migrated legacy database into the encrypted store.");
        }
        println!("Initialized lockbox in {}", dir.display());
    }
    Ok(())
}
