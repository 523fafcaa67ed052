//! AES-256-GCM sealing for database images and individual fields.
//!
//! Every sealed unit has the same self-describing layout:
//!
//! ```text
//! IV (12 bytes) || ciphertext (N bytes) || tag (16 bytes)
//! ```
//!
//! The IV is the GCM nonce and is freshly random for every call, so two seals
//! of the same plaintext never share a nonce or a tag. The same functions are
//! used for a whole serialized database and for a single password field.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use secrecy::SecretString;
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::kdf::MasterKey;
use crate::error::{LockboxError, Result};

/// Nonce (IV) size for AES-GCM.
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size.
pub const TAG_SIZE: usize = 16;

fn cipher_for(key: &MasterKey) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| LockboxError::Crypto(format!("Invalid key: {}", e)))
}

/// Encrypt `plaintext` under `key`, returning `IV || ciphertext || tag`.
///
/// # Errors
///
/// Returns `LockboxError::Crypto` if the random source or the cipher fails.
pub fn seal(plaintext: &[u8], key: &MasterKey) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    getrandom::getrandom(&mut nonce_bytes)
        .map_err(|e| LockboxError::Crypto(format!("Failed to generate nonce: {}", e)))?;

    // Encrypt in place inside the output buffer so no second plaintext copy exists.
    let mut blob = Vec::with_capacity(NONCE_SIZE + plaintext.len() + TAG_SIZE);
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(plaintext);

    match cipher.encrypt_in_place_detached(
        Nonce::from_slice(&nonce_bytes),
        b"",
        &mut blob[NONCE_SIZE..],
    ) {
        Ok(tag) => {
            blob.extend_from_slice(&tag);
            Ok(blob)
        }
        Err(_) => {
            blob.zeroize();
            Err(LockboxError::Crypto("Encryption failed".to_string()))
        }
    }
}

/// Decrypt a blob produced by [`seal`].
///
/// # Errors
///
/// - `LockboxError::MalformedInput` if the blob is shorter than IV + tag
/// - `LockboxError::AuthenticationFailure` if the tag does not verify
///   (wrong key or modified bytes anywhere in the blob)
pub fn open(blob: &[u8], key: &MasterKey) -> Result<Zeroizing<Vec<u8>>> {
    if blob.len() < NONCE_SIZE + TAG_SIZE {
        return Err(LockboxError::MalformedInput(format!(
            "Encrypted blob too short: {} bytes (minimum {})",
            blob.len(),
            NONCE_SIZE + TAG_SIZE
        )));
    }

    let (nonce_bytes, rest) = blob.split_at(NONCE_SIZE);
    let (ciphertext, tag) = rest.split_at(rest.len() - TAG_SIZE);

    let cipher = cipher_for(key)?;
    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce_bytes),
            b"",
            &mut buffer[..],
            Tag::from_slice(tag),
        )
        .map_err(|_| LockboxError::AuthenticationFailure)?;

    Ok(buffer)
}

/// Seal a single string field (password, note) with its own IV and tag.
pub fn seal_str(value: &str, key: &MasterKey) -> Result<Vec<u8>> {
    seal(value.as_bytes(), key)
}

/// Open a field sealed with [`seal_str`].
pub fn open_str(blob: &[u8], key: &MasterKey) -> Result<SecretString> {
    let plaintext = open(blob, key)?;
    let text = std::str::from_utf8(&plaintext)
        .map_err(|_| LockboxError::MalformedInput("Field is not valid UTF-8".to_string()))?;
    Ok(SecretString::from(text.to_owned()))
}
