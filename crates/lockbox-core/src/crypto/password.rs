//! Master password policy.
//!
//! Applied when a store is first set up. Unlocking never re-checks policy:
//! a password that was accepted once must keep working.

use crate::error::{LockboxError, Result};

/// Minimum master password length in characters.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Validate that a new master password meets minimum requirements.
///
/// # Requirements
///
/// - At least 8 characters long
/// - Not empty or only whitespace
///
/// # Examples
///
/// ```
/// use lockbox_core::crypto::validate_master_password;
///
/// assert!(validate_master_password("correct horse battery").is_ok());
/// assert!(validate_master_password("short").is_err());
/// ```
pub fn validate_master_password(password: &str) -> Result<()> {
    if password.trim().is_empty() {
        return Err(LockboxError::InvalidInput(
            "Master password cannot be empty".to_string(),
        ));
    }

    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(LockboxError::InvalidInput(format!(
            "Master password must be at least {} characters (got {})",
            MIN_PASSWORD_LENGTH, length
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_password() {
        assert!(validate_master_password("my-secure-password-123").is_ok());
        assert!(validate_master_password("exactly8").is_ok());
        assert!(validate_master_password("longer password with spaces and symbols!@#").is_ok());
    }

    #[test]
    fn test_password_too_short() {
        let result = validate_master_password("short");
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("at least 8 characters"));
    }

    #[test]
    fn test_password_empty() {
        assert!(validate_master_password("").is_err());
        assert!(validate_master_password("   ").is_err());
        assert!(validate_master_password("\n\t\n\t\n\t\n\t").is_err());
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // Four two-byte characters: 8 bytes but only 4 characters.
        assert!(validate_master_password("éééé").is_err());
        assert!(validate_master_password("éééééééé").is_ok());
    }
}
