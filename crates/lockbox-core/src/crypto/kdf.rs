//! Key derivation using Argon2id.
//!
//! This module derives encryption keys from master passwords using the
//! Argon2id algorithm, which is memory-hard and resistant to GPU-based attacks.
//! Two profiles exist: one for the frequently used unlock path and a stronger
//! one reserved for export archives.

use argon2::Argon2;
use subtle::ConstantTimeEq;
use zeroize::ZeroizeOnDrop;

use crate::error::{LockboxError, Result};

/// Length of derived key in bytes (32 bytes = 256 bits for AES-256).
pub const KEY_LENGTH: usize = 32;

/// Length of a generated salt in bytes.
pub const SALT_LENGTH: usize = 32;

/// Shortest salt accepted by [`derive_key`].
const MIN_SALT_LENGTH: usize = 16;

/// BLAKE3 context for the stored password verifier.
const VERIFIER_CONTEXT: &str = "lockbox 2026-01 master password verifier";

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of iterations
    pub time_cost: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl KdfParams {
    /// Explicit parameters. Prefer [`KdfParams::unlock`] and [`KdfParams::export`].
    pub const fn new(memory_kib: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            time_cost,
            parallelism,
        }
    }

    /// Profile for unlocking the store: 64 MiB, 3 iterations, 1 lane.
    pub const fn unlock() -> Self {
        Self::new(64 * 1024, 3, 1)
    }

    /// Profile for export archive keys: 128 MiB, 4 iterations, 1 lane.
    ///
    /// Export files are attacked offline far away from the unlock path, so
    /// they get their own, more expensive parameters.
    pub const fn export() -> Self {
        Self::new(128 * 1024, 4, 1)
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::unlock()
    }
}

/// A cryptographic key derived from a master password.
///
/// Key material is zeroized from memory when the value is dropped.
#[derive(ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; KEY_LENGTH],
}

impl MasterKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key: bytes }
    }

    /// Raw key bytes. Use only for immediate cipher operations; never store or log.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Random per-store salt.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt([u8; SALT_LENGTH]);

impl Salt {
    /// Generate a fresh salt from the OS random number generator.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; SALT_LENGTH];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| LockboxError::Crypto(format!("Failed to generate salt: {}", e)))?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; SALT_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse a hex-encoded salt as stored in the metadata sidecar.
    pub fn from_hex(value: &str) -> Result<Self> {
        let decoded = hex::decode(value.trim())
            .map_err(|e| LockboxError::MalformedInput(format!("Invalid salt hex: {}", e)))?;
        let bytes: [u8; SALT_LENGTH] = decoded.try_into().map_err(|v: Vec<u8>| {
            LockboxError::MalformedInput(format!(
                "Salt must be {} bytes (got {})",
                SALT_LENGTH,
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LENGTH] {
        &self.0
    }
}

impl std::fmt::Debug for Salt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Salt").field(&self.to_hex()).finish()
    }
}

/// Derive an encryption key from a master password using Argon2id.
///
/// Same password + salt + params always produce the same key. A wrong
/// password is not an error here; it only shows up as a verifier mismatch
/// or as an authentication failure when the key is used.
///
/// # Errors
///
/// Returns `LockboxError::InvalidInput` for an empty password or a salt
/// shorter than 16 bytes, and `LockboxError::Crypto` for invalid parameters.
pub fn derive_key(password: &str, salt: &[u8], params: &KdfParams) -> Result<MasterKey> {
    if password.is_empty() {
        return Err(LockboxError::InvalidInput(
            "Password cannot be empty".to_string(),
        ));
    }

    if salt.len() < MIN_SALT_LENGTH {
        return Err(LockboxError::InvalidInput(format!(
            "Salt must be at least {} bytes",
            MIN_SALT_LENGTH
        )));
    }

    let argon2_params = argon2::Params::new(
        params.memory_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_LENGTH),
    )
    .map_err(|e| LockboxError::Crypto(format!("Failed to create Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2_params,
    );

    let mut key_bytes = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key_bytes)
        .map_err(|e| LockboxError::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(MasterKey::from_bytes(key_bytes))
}

/// Verification hash persisted in the metadata sidecar.
///
/// Derived one-way from the key so the sidecar never contains key material.
pub fn verifier(key: &MasterKey) -> [u8; KEY_LENGTH] {
    blake3::derive_key(VERIFIER_CONTEXT, key.as_bytes())
}

/// Constant-time comparison of a key's verifier against a stored hash.
pub(crate) fn verifier_matches(key: &MasterKey, stored: &[u8]) -> bool {
    let mut computed = verifier(key);
    let equal: bool = computed.as_slice().ct_eq(stored).into();
    zeroize::Zeroize::zeroize(&mut computed);
    equal
}

/// Re-derive the key for `password` and compare its verifier with `stored_hash`.
pub fn verify_password(
    password: &str,
    salt: &[u8],
    params: &KdfParams,
    stored_hash: &[u8],
) -> Result<bool> {
    let key = derive_key(password, salt, params)?;
    Ok(verifier_matches(&key, stored_hash))
}
