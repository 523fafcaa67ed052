//! Input handling helpers for master passwords and secret values.

use std::io::{self, IsTerminal, Read};

use dialoguer::Password;
use zeroize::Zeroizing;

use lockbox_core::crypto::validate_master_password;

use crate::constants::PASSWORD_ENV;

/// Master password from LOCKBOX_PASSWORD, if set and non-blank.
pub fn env_password() -> Option<Zeroizing<String>> {
    std::env::var(PASSWORD_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(Zeroizing::new)
}

/// Prompt once for an existing password.
pub fn prompt_password(prompt: &str) -> anyhow::Result<Zeroizing<String>> {
    Password::new()
        .with_prompt(prompt)
        .interact()
        .map(Zeroizing::new)
        .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))
}

/// New master password for `init`, from the env var or a confirmed prompt.
pub fn prompt_new_password(no_input: bool) -> anyhow::Result<Zeroizing<String>> {
    if let Some(value) = env_password() {
        validate_master_password(&value)
            .map_err(|e| anyhow::anyhow!("Password does not meet requirements: {}", e))?;
        return Ok(value);
    }
    if no_input || !io::stdin().is_terminal() {
        return Err(anyhow::anyhow!("--no-input requires {}", PASSWORD_ENV));
    }
    loop {
        let password = Password::new()
            .with_prompt("New master password")
            .with_confirmation("Confirm master password", "Passwords do not match")
            .interact()
            .map(Zeroizing::new)
            .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))?;
        if let Err(err) = validate_master_password(&password) {
            eprintln!("Password does not meet requirements: {}", err);
            continue;
        }
        return Ok(password);
    }
}

/// Read a secret value from `--value`, stdin, or a hidden prompt.
pub fn read_secret_value(
    no_input: bool,
    value: Option<String>,
) -> anyhow::Result<Zeroizing<String>> {
    if let Some(value) = value {
        if value.is_empty() {
            return Err(anyhow::anyhow!("--value cannot be empty"));
        }
        return Ok(Zeroizing::new(value));
    }

    if !io::stdin().is_terminal() {
        let mut buffer = Zeroizing::new(String::new());
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| anyhow::anyhow!("Failed to read stdin: {}", e))?;
        let trimmed = Zeroizing::new(buffer.trim_end_matches(['\r', '\n']).to_string());
        if trimmed.is_empty() {
            return Err(anyhow::anyhow!("No input provided on stdin"));
        }
        return Ok(trimmed);
    }

    if no_input {
        return Err(anyhow::anyhow!("--no-input requires --value or stdin"));
    }

    prompt_password("Secret value")
}
