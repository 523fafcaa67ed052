//! CLI error types for structured error handling.
//!
//! This module provides typed errors that map to specific exit codes,
//! enabling consistent error handling across the CLI.

use std::fmt;

use lockbox_core::LockboxError;

use crate::constants::exit_codes;

/// CLI-specific errors with associated exit codes.
#[derive(Debug)]
pub enum CliError {
    /// Resource not found (store, secret)
    NotFound { message: String, hint: String },

    /// Authentication failed (wrong master password, too many attempts)
    AuthFailed {
        message: String,
        hint: Option<String>,
    },

    /// Invalid user input
    InvalidInput(String),

    /// Store or metadata damaged
    IntegrityFailed { message: String, hint: String },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::NotFound { message, hint } | CliError::IntegrityFailed { message, hint } => {
                write!(f, "{}\n{}", message, hint)
            }
            CliError::AuthFailed { message, hint } => {
                if let Some(h) = hint {
                    write!(f, "{}\n{}", message, h)
                } else {
                    write!(f, "{}", message)
                }
            }
            CliError::InvalidInput(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Create a NotFound error with message and hint.
    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::NotFound {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Create an AuthFailed error with message.
    pub fn auth_failed(message: impl Into<String>) -> Self {
        CliError::AuthFailed {
            message: message.into(),
            hint: None,
        }
    }

    /// Create an AuthFailed error with message and hint.
    pub fn auth_failed_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::AuthFailed {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        CliError::InvalidInput(message.into())
    }

    /// Create an IntegrityFailed error with message and hint.
    pub fn integrity_failed(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::IntegrityFailed {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::AuthFailed { .. } => exit_codes::AUTH_FAILED,
            CliError::InvalidInput(_) => exit_codes::INVALID_INPUT,
            CliError::IntegrityFailed { .. } => exit_codes::INTEGRITY_FAILED,
        }
    }
}

/// Exit code for any error bubbling out of a command.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return cli_err.exit_code();
    }
    match err.downcast_ref::<LockboxError>() {
        Some(LockboxError::WrongPassword) => exit_codes::AUTH_FAILED,
        Some(LockboxError::InvalidInput(_)) => exit_codes::INVALID_INPUT,
        Some(
            LockboxError::MissingMetadata
            | LockboxError::CorruptedStore
            | LockboxError::AuthenticationFailure
            | LockboxError::MalformedInput(_),
        ) => exit_codes::INTEGRITY_FAILED,
        _ => exit_codes::GENERAL,
    }
}

/// Translate an unlock failure into a user-facing error.
pub fn unlock_error(err: LockboxError) -> anyhow::Error {
    match err {
        LockboxError::WrongPassword => CliError::auth_failed("Incorrect master password").into(),
        LockboxError::MissingMetadata => CliError::integrity_failed(
            "Encrypted store exists but auth.json is missing",
            "Hint: Restore auth.json from a backup. The store will not be recreated.",
        )
        .into(),
        LockboxError::CorruptedStore => CliError::integrity_failed(
            "Master password is correct but the encrypted store could not be decrypted",
            "Hint: Restore store.enc from a backup (see `lockbox backup`).",
        )
        .into(),
        other => other.into(),
    }
}
