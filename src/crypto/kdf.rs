//! Password-based key derivation using Argon2id.
//!
//! Two distinct uses of the same primitive live here:
//!
//! - deriving the 32-byte symmetric key that seals the container
//!   (`derive_container_key_with_params`), and
//! - hashing the master password into a PHC string stored inside the
//!   metadata store's auth record (`hash_master_password` /
//!   `verify_master_password`) for the independent verification step
//!   during open.

use argon2::password_hash::{rand_core::OsRng as PhcOsRng, PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use rand::RngCore;

use crate::errors::{CofferError, Result};

/// Length of the container salt in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Length of the derived key in bytes (256 bits, for AES-256).
const KEY_LEN: usize = 32;

/// Configurable Argon2id parameters.
///
/// These map 1:1 to the fields in `Settings` so callers can pass whatever
/// the embedder configured in `coffer.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Minimum safe memory cost in KiB (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Derive a 32-byte container key with explicit Argon2id parameters.
///
/// The same password + salt + params will always produce the same key.
/// Enforces minimum parameters to prevent dangerously weak KDF settings.
pub fn derive_container_key_with_params(
    password: &[u8],
    salt: &[u8],
    argon2_params: &Argon2Params,
) -> Result<[u8; KEY_LEN]> {
    if argon2_params.memory_kib < MIN_MEMORY_KIB {
        return Err(CofferError::KeyDerivationFailed(format!(
            "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
            argon2_params.memory_kib
        )));
    }
    if argon2_params.iterations < 1 {
        return Err(CofferError::KeyDerivationFailed(
            "Argon2 iterations must be at least 1".into(),
        ));
    }
    if argon2_params.parallelism < 1 {
        return Err(CofferError::KeyDerivationFailed(
            "Argon2 parallelism must be at least 1".into(),
        ));
    }

    let params = Params::new(
        argon2_params.memory_kib,
        argon2_params.iterations,
        argon2_params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| CofferError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password, salt, &mut key)
        .map_err(|e| CofferError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}")))?;

    Ok(key)
}

/// Derive a 32-byte container key using the default parameters.
///
/// Prefer `derive_container_key_with_params` when you have a `Settings`.
pub fn derive_container_key(password: &[u8], salt: &[u8]) -> Result<[u8; KEY_LEN]> {
    derive_container_key_with_params(password, salt, &Argon2Params::default())
}

/// Generate a cryptographically random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Hash the master password into a self-describing PHC string.
///
/// Stored in the auth record so open can verify the password
/// independently of the container layer decrypting successfully.
pub fn hash_master_password(password: &[u8]) -> Result<String> {
    let salt = SaltString::generate(&mut PhcOsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password, &salt)
        .map_err(|e| CofferError::KeyDerivationFailed(format!("password hashing failed: {e}")))?;

    Ok(hash.to_string())
}

/// Verify a master password against a stored PHC string.
///
/// Returns `Ok(false)` on mismatch; errors only when the stored string
/// itself is malformed.
pub fn verify_master_password(password: &[u8], stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        CofferError::KeyDerivationFailed(format!("stored password hash is malformed: {e}"))
    })?;

    Ok(Argon2::default().verify_password(password, &parsed).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_key() {
        let salt = generate_salt();
        let a = derive_container_key(b"hunter2", &salt).unwrap();
        let b = derive_container_key(b"hunter2", &salt).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_salt_different_key() {
        let a = derive_container_key(b"hunter2", &generate_salt()).unwrap();
        let b = derive_container_key(b"hunter2", &generate_salt()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_weak_memory_param() {
        let params = Argon2Params {
            memory_kib: 1024,
            iterations: 3,
            parallelism: 4,
        };
        let result = derive_container_key_with_params(b"pw", &generate_salt(), &params);
        assert!(result.is_err());
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_master_password(b"P@ss1").unwrap();
        assert!(verify_master_password(b"P@ss1", &hash).unwrap());
        assert!(!verify_master_password(b"P@ss2", &hash).unwrap());
    }

    #[test]
    fn password_hashes_are_salted() {
        let a = hash_master_password(b"same").unwrap();
        let b = hash_master_password(b"same").unwrap();
        assert_ne!(a, b);
    }
}
