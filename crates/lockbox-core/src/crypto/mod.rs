//! Cryptographic operations for Lockbox.
//!
//! This module provides key derivation and authenticated encryption using
//! well-audited libraries:
//! - **Argon2id**: Memory-hard key derivation function
//! - **AES-256-GCM**: Authenticated encryption for database images and fields
//!
//! ## Security Model
//!
//! - The master password is never stored; only a verifier derived from the key
//! - Every sealed unit gets its own random nonce
//! - Keys and plaintext buffers are zeroized from memory on drop
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft of the encrypted store or export archives
//! - Offline brute-force attacks on the master password
//! - Tampering with encrypted files
//!
//! We do NOT defend against:
//! - Compromised OS / keylogger
//! - Access to an unlocked session / process memory

pub mod cipher;
pub mod generator;
pub mod kdf;
pub mod password;

pub use cipher::{open, open_str, seal, seal_str, NONCE_SIZE, TAG_SIZE};
pub use generator::{
    generate_password, password_strength, PasswordOptions, StrengthLevel, DEFAULT_LENGTH,
};
pub use kdf::{derive_key, verifier, verify_password, KdfParams, MasterKey, Salt, KEY_LENGTH};
pub use password::validate_master_password;
