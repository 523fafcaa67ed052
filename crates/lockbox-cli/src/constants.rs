//! Constants used throughout the CLI.

/// Environment variable holding the master password for non-interactive use.
pub const PASSWORD_ENV: &str = "LOCKBOX_PASSWORD";

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "LOCKBOX_CONFIG";

/// Environment variable with a `tracing` filter directive.
pub const LOG_ENV: &str = "LOCKBOX_LOG";

/// Interactive unlock attempts before giving up.
pub const MAX_UNLOCK_ATTEMPTS: u32 = 3;

/// Exit codes for the CLI.
///
/// These follow common Unix conventions:
/// - 0: Success
/// - 1: General error (used by anyhow for unhandled errors)
/// - 2: Misuse of shell command (reserved by shells)
/// - 3+: Application-specific errors
pub mod exit_codes {
    /// General failure.
    pub const GENERAL: i32 = 1;

    /// Resource not found (store, secret).
    pub const NOT_FOUND: i32 = 3;

    /// Invalid user input or arguments.
    pub const INVALID_INPUT: i32 = 4;

    /// Authentication failed (wrong master password, too many attempts).
    pub const AUTH_FAILED: i32 = 5;

    /// Store or metadata is damaged.
    pub const INTEGRITY_FAILED: i32 = 6;
}
