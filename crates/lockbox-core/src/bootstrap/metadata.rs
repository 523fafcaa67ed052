//! `auth.json`: the salt and password verifier.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::{self, verifier_matches, KdfParams, MasterKey, Salt};
use crate::error::{LockboxError, Result};
use crate::fs::write_atomic;

/// Persisted proof that a master password has been set.
///
/// `master_password_hash` is a verifier derived from the key, not the key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthMetadata {
    pub master_password_hash: String,
    pub salt: String,
}

impl AuthMetadata {
    /// Build metadata for a freshly derived key.
    pub fn for_key(key: &MasterKey, salt: &Salt) -> Self {
        Self {
            master_password_hash: hex::encode(kdf::verifier(key)),
            salt: salt.to_hex(),
        }
    }

    /// Read the sidecar. `Ok(None)` if it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let metadata: Self = serde_json::from_slice(&bytes).map_err(|e| {
            LockboxError::MalformedInput(format!("Invalid authentication metadata: {}", e))
        })?;
        Ok(Some(metadata))
    }

    /// Write the sidecar atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json)
    }

    pub fn salt(&self) -> Result<Salt> {
        Salt::from_hex(&self.salt)
    }

    fn stored_hash(&self) -> Result<Vec<u8>> {
        hex::decode(self.master_password_hash.trim()).map_err(|e| {
            LockboxError::MalformedInput(format!("Invalid password hash hex: {}", e))
        })
    }

    /// Whether `key` is the key this metadata was created for.
    pub fn matches(&self, key: &MasterKey) -> Result<bool> {
        Ok(verifier_matches(key, &self.stored_hash()?))
    }

    /// Derive the key for `password` and return it only if it verifies.
    ///
    /// # Errors
    ///
    /// `WrongPassword` on verifier mismatch.
    pub fn unlock_key(&self, password: &str, params: &KdfParams) -> Result<MasterKey> {
        let salt = self.salt()?;
        let key = kdf::derive_key(password, salt.as_bytes(), params)?;
        if self.matches(&key)? {
            Ok(key)
        } else {
            Err(LockboxError::WrongPassword)
        }
    }
}

impl std::fmt::Debug for AuthMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMetadata")
            .field("master_password_hash", &"[REDACTED]")
            .field("salt", &self.salt)
            .finish()
    }
}
