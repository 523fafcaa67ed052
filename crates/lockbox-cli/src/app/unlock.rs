//! Master password handling and vault unlocking with retry logic.

use std::io::IsTerminal;

use zeroize::Zeroizing;

use lockbox_core::{BootStatus, LockboxError, Vault};

use crate::constants::{MAX_UNLOCK_ATTEMPTS, PASSWORD_ENV};
use crate::errors::{unlock_error, CliError};
use crate::helpers::{env_password, prompt_password};

use super::resolver::missing_store_message;

/// Unlock `vault`, returning the password that worked.
///
/// LOCKBOX_PASSWORD is tried once. Otherwise the user gets
/// `MAX_UNLOCK_ATTEMPTS` prompts when a TTY is available.
pub fn unlock_vault(vault: &Vault, no_input: bool) -> anyhow::Result<Zeroizing<String>> {
    match vault.status() {
        BootStatus::FirstRun => {
            return Err(CliError::not_found(
                missing_store_message(vault.paths().dir()),
                "Hint: Run `lockbox init` to set a master password.",
            )
            .into())
        }
        BootStatus::MissingMetadata => return Err(unlock_error(LockboxError::MissingMetadata)),
        BootStatus::NeedsUnlock | BootStatus::DecryptError | BootStatus::Ready => {}
    }

    if let Some(password) = env_password() {
        vault.unlock(&password).map_err(unlock_error)?;
        tracing::debug!("unlocked with {}", PASSWORD_ENV);
        return Ok(password);
    }

    let interactive = std::io::stdin().is_terminal() && !no_input;
    if !interactive {
        return Err(CliError::auth_failed_with_hint(
            "No master password provided and no TTY available.",
            format!("Hint: Set {} for non-interactive use.", PASSWORD_ENV),
        )
        .into());
    }

    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        let password = prompt_password("Master password")?;
        match vault.unlock(&password) {
            Ok(()) => return Ok(password),
            Err(LockboxError::WrongPassword) => {
                let remaining = MAX_UNLOCK_ATTEMPTS.saturating_sub(attempts);
                if remaining == 0 {
                    return Err(CliError::auth_failed_with_hint(
                        "Too many failed password attempts.",
                        "Hint: A forgotten master password cannot be recovered.\n      Backups use the same password.",
                    )
                    .into());
                }
                eprintln!(
                    "Incorrect master password. {} attempt{} remaining.",
                    remaining,
                    if remaining == 1 { "" } else { "s" }
                );
            }
            Err(err) => return Err(unlock_error(err)),
        }
    }
}
