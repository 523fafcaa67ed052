//! Password-protected export archives.
//!
//! An archive is self-contained: it carries its own salt and KDF parameters,
//! so it can be opened on another machine with only the password.
//!
//! ```text
//! header length (u32 BE) || header JSON || salt (32 bytes) || IV || ciphertext || tag
//! ```
//!
//! The key comes from the export KDF profile, never from the unlock key, so
//! a leaked archive gives an attacker nothing about the live store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::kdf::{derive_key, KdfParams, Salt, SALT_LENGTH};
use crate::crypto::{cipher, NONCE_SIZE, TAG_SIZE};
use crate::error::{LockboxError, Result};

/// Current archive format version.
pub const ARCHIVE_VERSION: &str = "1.0";

/// Cipher name recorded in the header.
pub const ARCHIVE_ALGORITHM: &str = "aes-256-gcm";

/// KDF name recorded in the header.
pub const ARCHIVE_KDF: &str = "argon2id";

const LENGTH_PREFIX: usize = 4;
const MAX_HEADER_BYTES: usize = 64 * 1024;

// Upper bounds on header-supplied KDF costs, so a crafted archive cannot
// make the reader allocate or spin without limit.
const MAX_MEMORY_KIB: u32 = 1024 * 1024;
const MAX_TIME_COST: u32 = 64;
const MAX_PARALLELISM: u32 = 16;

/// Plaintext header at the start of every archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveHeader {
    pub version: String,
    pub algorithm: String,
    pub kdf: String,
    pub memory_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
    pub created_at: DateTime<Utc>,
    /// Length of the sealed blob after the salt.
    pub data_length: u64,
}

impl ArchiveHeader {
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams::new(self.memory_kib, self.time_cost, self.parallelism)
    }

    fn validate(&self) -> Result<()> {
        if self.version != ARCHIVE_VERSION {
            return Err(LockboxError::MalformedInput(format!(
                "Unsupported archive version: {}",
                self.version
            )));
        }
        if self.algorithm != ARCHIVE_ALGORITHM || self.kdf != ARCHIVE_KDF {
            return Err(LockboxError::MalformedInput(format!(
                "Unsupported archive algorithm: {} / {}",
                self.algorithm, self.kdf
            )));
        }
        if self.memory_kib > MAX_MEMORY_KIB
            || self.time_cost > MAX_TIME_COST
            || self.parallelism > MAX_PARALLELISM
        {
            return Err(LockboxError::MalformedInput(
                "Archive KDF parameters exceed allowed limits".to_string(),
            ));
        }
        Ok(())
    }
}

/// Encrypt `payload` into a new archive under a key derived from `password`.
pub fn seal_archive(payload: &[u8], password: &str, params: &KdfParams) -> Result<Vec<u8>> {
    let salt = Salt::generate()?;
    let key = derive_key(password, salt.as_bytes(), params)?;
    let sealed = cipher::seal(payload, &key)?;

    let header = ArchiveHeader {
        version: ARCHIVE_VERSION.to_string(),
        algorithm: ARCHIVE_ALGORITHM.to_string(),
        kdf: ARCHIVE_KDF.to_string(),
        memory_kib: params.memory_kib,
        time_cost: params.time_cost,
        parallelism: params.parallelism,
        created_at: Utc::now(),
        data_length: sealed.len() as u64,
    };
    let header_json = serde_json::to_vec(&header)?;
    let header_len = u32::try_from(header_json.len())
        .map_err(|_| LockboxError::InvalidInput("Archive header too large".to_string()))?;

    let mut out =
        Vec::with_capacity(LENGTH_PREFIX + header_json.len() + SALT_LENGTH + sealed.len());
    out.extend_from_slice(&header_len.to_be_bytes());
    out.extend_from_slice(&header_json);
    out.extend_from_slice(salt.as_bytes());
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Split an archive into header, salt and sealed blob, checking the framing.
fn parse(bytes: &[u8]) -> Result<(ArchiveHeader, &[u8], &[u8])> {
    if bytes.len() < LENGTH_PREFIX {
        return Err(LockboxError::MalformedInput(
            "Archive too short for header length".to_string(),
        ));
    }
    let (prefix, rest) = bytes.split_at(LENGTH_PREFIX);
    let mut len_bytes = [0u8; LENGTH_PREFIX];
    len_bytes.copy_from_slice(prefix);
    let header_len = u32::from_be_bytes(len_bytes) as usize;

    if header_len == 0 || header_len > MAX_HEADER_BYTES || header_len > rest.len() {
        return Err(LockboxError::MalformedInput(format!(
            "Invalid archive header length: {}",
            header_len
        )));
    }
    let (header_json, rest) = rest.split_at(header_len);
    let header: ArchiveHeader = serde_json::from_slice(header_json)
        .map_err(|e| LockboxError::MalformedInput(format!("Invalid archive header: {}", e)))?;
    header.validate()?;

    if rest.len() < SALT_LENGTH {
        return Err(LockboxError::MalformedInput(
            "Archive truncated before salt".to_string(),
        ));
    }
    let (salt, blob) = rest.split_at(SALT_LENGTH);
    if blob.len() as u64 != header.data_length || blob.len() < NONCE_SIZE + TAG_SIZE {
        return Err(LockboxError::MalformedInput(format!(
            "Archive data length mismatch: header says {}, found {}",
            header.data_length,
            blob.len()
        )));
    }
    Ok((header, salt, blob))
}

/// Read the plaintext header without a password.
pub fn read_header(bytes: &[u8]) -> Result<ArchiveHeader> {
    parse(bytes).map(|(header, _, _)| header)
}

/// Decrypt an archive produced by [`seal_archive`].
///
/// # Errors
///
/// - `MalformedInput` for bad framing or an unsupported header
/// - `AuthenticationFailure` for a wrong password or modified bytes
pub fn open_archive(bytes: &[u8], password: &str) -> Result<Zeroizing<Vec<u8>>> {
    let (header, salt, blob) = parse(bytes)?;
    let key = derive_key(password, salt, &header.kdf_params())?;
    cipher::open(blob, &key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: KdfParams = KdfParams::new(1024, 1, 1);

    #[test]
    fn test_archive_round_trip() {
        let archive = seal_archive(b"database image", "export-password", &FAST).unwrap();
        let payload = open_archive(&archive, "export-password").unwrap();
        assert_eq!(payload.as_slice(), b"database image");
    }

    #[test]
    fn test_header_is_readable_without_password() {
        let archive = seal_archive(b"payload", "export-password", &FAST).unwrap();
        let header = read_header(&archive).unwrap();

        assert_eq!(header.version, ARCHIVE_VERSION);
        assert_eq!(header.algorithm, "aes-256-gcm");
        assert_eq!(header.kdf, "argon2id");
        assert_eq!(header.kdf_params(), FAST);
        assert_eq!(header.data_length as usize, NONCE_SIZE + 7 + TAG_SIZE);
    }

    #[test]
    fn test_header_json_field_names() {
        let archive = seal_archive(b"payload", "export-password", &FAST).unwrap();
        let len = u32::from_be_bytes([archive[0], archive[1], archive[2], archive[3]]) as usize;
        let json: serde_json::Value = serde_json::from_slice(&archive[4..4 + len]).unwrap();

        for field in [
            "version",
            "algorithm",
            "kdf",
            "memoryKib",
            "timeCost",
            "parallelism",
            "createdAt",
            "dataLength",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
    }

    #[test]
    fn test_wrong_password_fails_authentication() {
        let archive = seal_archive(b"payload", "export-password", &FAST).unwrap();
        assert!(matches!(
            open_archive(&archive, "other-password"),
            Err(LockboxError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails_authentication() {
        let mut archive = seal_archive(b"payload", "export-password", &FAST).unwrap();
        let last = archive.len() - 1;
        archive[last] ^= 0x80;
        assert!(matches!(
            open_archive(&archive, "export-password"),
            Err(LockboxError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_truncated_archive_is_malformed() {
        let archive = seal_archive(b"payload", "export-password", &FAST).unwrap();
        for len in [0, 3, 10, archive.len() - 1] {
            assert!(matches!(
                open_archive(&archive[..len], "export-password"),
                Err(LockboxError::MalformedInput(_))
            ));
        }
    }

    #[test]
    fn test_oversized_kdf_cost_rejected() {
        let header = ArchiveHeader {
            version: ARCHIVE_VERSION.to_string(),
            algorithm: ARCHIVE_ALGORITHM.to_string(),
            kdf: ARCHIVE_KDF.to_string(),
            memory_kib: MAX_MEMORY_KIB + 1,
            time_cost: 1,
            parallelism: 1,
            created_at: Utc::now(),
            data_length: 28,
        };
        let json = serde_json::to_vec(&header).unwrap();
        let mut archive = (json.len() as u32).to_be_bytes().to_vec();
        archive.extend_from_slice(&json);
        archive.extend_from_slice(&[0u8; SALT_LENGTH + 28]);

        assert!(matches!(
            read_header(&archive),
            Err(LockboxError::MalformedInput(_))
        ));
    }
}
