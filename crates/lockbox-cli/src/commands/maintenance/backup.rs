use std::io::IsTerminal;
use std::path::Path;

use lockbox_core::bootstrap::{METADATA_FILE, STORE_FILE};
use lockbox_core::BootStatus;

use crate::app::{missing_store_message, AppContext};
use crate::cli::BackupArgs;
use crate::errors::CliError;

/// Copy `store.enc` and `auth.json` into a directory. Both stay encrypted or
/// hashed, so no unlock is needed.
pub fn handle_backup(ctx: &AppContext, args: &BackupArgs) -> anyhow::Result<()> {
    let vault = ctx.vault()?;
    let paths = vault.paths();
    match vault.status() {
        BootStatus::NeedsUnlock if paths.has_store() => {}
        BootStatus::MissingMetadata => {
            return Err(CliError::integrity_failed(
                "auth.json is missing; a backup without it could never be unlocked",
                "Hint: Restore auth.json before taking a backup.",
            )
            .into())
        }
        _ => {
            return Err(CliError::not_found(
                missing_store_message(paths.dir()),
                "Hint: Run `lockbox init` to create a store.",
            )
            .into())
        }
    }

    let destination = Path::new(&args.destination);
    if destination.exists() && !destination.is_dir() {
        return Err(CliError::invalid_input(format!(
            "Backup destination {} is not a directory",
            destination.display()
        ))
        .into());
    }
    if std::io::stdin().is_terminal() && !ctx.quiet() && !ctx.no_input() {
        let proceed = dialoguer::Confirm::new()
            .with_prompt(format!("Back up lockbox to {}?", destination.display()))
            .default(true)
            .interact()?;
        if !proceed {
            return Err(anyhow::anyhow!("Backup cancelled"));
        }
    }

    std::fs::create_dir_all(destination).map_err(|e| {
        anyhow::anyhow!(
            "Failed to create backup directory {}: {}",
            destination.display(),
            e
        )
    })?;

    let mut total = 0;
    for (source, name) in [(&paths.metadata, METADATA_FILE), (&paths.store, STORE_FILE)] {
        let bytes = std::fs::read(source)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", source.display(), e))?;
        if bytes.is_empty() {
            return Err(anyhow::anyhow!("Backup failed: {} is empty", source.display()));
        }
        lockbox_core::fs::write_atomic(&destination.join(name), &bytes)?;
        total += bytes.len();
    }
    tracing::info!(bytes = total, destination = %destination.display(), "backup written");

    if !ctx.quiet() {
        println!("Backed up lockbox to {}", destination.display());
    }
    Ok(())
}
