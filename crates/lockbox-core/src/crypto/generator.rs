//! Random password generation and a simple strength score.

use zeroize::Zeroizing;

use crate::error::{LockboxError, Result};

/// Default generated password length.
pub const DEFAULT_LENGTH: usize = 16;

/// Longest password [`generate_password`] will produce.
pub const MAX_LENGTH: usize = 1024;

const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const UPPERCASE_CLEAR: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const LOWERCASE_CLEAR: &str = "abcdefghjkmnpqrstuvwxyz";
const DIGITS: &str = "0123456789";
const DIGITS_CLEAR: &str = "23456789";
const SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Character classes for [`generate_password`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordOptions {
    pub uppercase: bool,
    pub lowercase: bool,
    pub numbers: bool,
    pub symbols: bool,
    /// Leave out look-alikes such as `I`, `l`, `O` and `0`
    pub exclude_ambiguous: bool,
}

impl Default for PasswordOptions {
    fn default() -> Self {
        Self {
            uppercase: true,
            lowercase: true,
            numbers: true,
            symbols: true,
            exclude_ambiguous: true,
        }
    }
}

impl PasswordOptions {
    fn charset(&self) -> Vec<char> {
        let pick = |clear: &'static str, full: &'static str| {
            if self.exclude_ambiguous {
                clear
            } else {
                full
            }
        };
        let mut charset = String::new();
        if self.uppercase {
            charset.push_str(pick(UPPERCASE_CLEAR, UPPERCASE));
        }
        if self.lowercase {
            charset.push_str(pick(LOWERCASE_CLEAR, LOWERCASE));
        }
        if self.numbers {
            charset.push_str(pick(DIGITS_CLEAR, DIGITS));
        }
        if self.symbols {
            charset.push_str(SYMBOLS);
        }
        charset.chars().collect()
    }
}

/// Generate a password of `length` characters drawn uniformly from the
/// selected classes, using the OS random source.
///
/// # Errors
///
/// `InvalidInput` if `length` is zero or above [`MAX_LENGTH`], or if every
/// character class is disabled.
///
/// # Examples
///
/// ```
/// use lockbox_core::crypto::{generate_password, PasswordOptions};
///
/// let password = generate_password(20, &PasswordOptions::default()).unwrap();
/// assert_eq!(password.chars().count(), 20);
/// ```
pub fn generate_password(length: usize, options: &PasswordOptions) -> Result<Zeroizing<String>> {
    if length == 0 || length > MAX_LENGTH {
        return Err(LockboxError::InvalidInput(format!(
            "Password length must be between 1 and {}",
            MAX_LENGTH
        )));
    }
    let charset = options.charset();
    if charset.is_empty() {
        return Err(LockboxError::InvalidInput(
            "At least one character class must be enabled".to_string(),
        ));
    }

    let mut password = Zeroizing::new(String::with_capacity(length));
    for _ in 0..length {
        password.push(charset[random_index(charset.len())?]);
    }
    Ok(password)
}

/// Uniform index in `0..bound` by rejection sampling, so no character is
/// favoured by modulo bias.
fn random_index(bound: usize) -> Result<usize> {
    let bound = bound as u32;
    let zone = u32::MAX - (u32::MAX % bound);
    loop {
        let mut bytes = [0u8; 4];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| LockboxError::Crypto(format!("Failed to generate password: {}", e)))?;
        let value = u32::from_le_bytes(bytes);
        if value < zone {
            return Ok((value % bound) as usize);
        }
    }
}

/// Coarse rating derived from [`password_strength`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StrengthLevel {
    Weak,
    Fair,
    Strong,
}

impl StrengthLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=39 => StrengthLevel::Weak,
            40..=69 => StrengthLevel::Fair,
            _ => StrengthLevel::Strong,
        }
    }
}

impl std::fmt::Display for StrengthLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StrengthLevel::Weak => "weak",
            StrengthLevel::Fair => "fair",
            StrengthLevel::Strong => "strong",
        };
        f.write_str(label)
    }
}

/// Score a password from 0 to 100.
///
/// Up to 30 points for length (8, 12 and 16 characters), 40 for character
/// variety (lowercase, uppercase, digits, other), and 30 for structure: mostly
/// distinct characters, no run of three identical characters, and no
/// ascending run such as `abc` or `345`.
pub fn password_strength(password: &str) -> u8 {
    let chars: Vec<char> = password.chars().collect();
    if chars.is_empty() {
        return 0;
    }
    let length = chars.len();
    let mut score = 0u8;

    for threshold in [8, 12, 16] {
        if length >= threshold {
            score += 10;
        }
    }

    let classes = [
        chars.iter().any(|c| c.is_ascii_lowercase()),
        chars.iter().any(|c| c.is_ascii_uppercase()),
        chars.iter().any(|c| c.is_ascii_digit()),
        chars.iter().any(|c| !c.is_ascii_alphanumeric()),
    ];
    score += 10 * classes.iter().filter(|present| **present).count() as u8;

    let mut distinct = chars.clone();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() * 10 >= length * 7 {
        score += 10;
    }

    if !chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2]) {
        score += 10;
    }

    if !chars.windows(3).any(is_ascending_run) {
        score += 10;
    }

    score.min(100)
}

fn is_ascending_run(window: &[char]) -> bool {
    let lowered: Vec<char> = window.iter().map(|c| c.to_ascii_lowercase()).collect();
    if lowered == ['8', '9', '0'] {
        return true;
    }
    let same_class = lowered.iter().all(|c| c.is_ascii_digit())
        || lowered.iter().all(|c| c.is_ascii_lowercase());
    same_class
        && lowered
            .windows(2)
            .all(|pair| pair[1] as u32 == pair[0] as u32 + 1)
}
