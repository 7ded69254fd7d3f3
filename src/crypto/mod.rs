//! Cryptographic primitives for Coffer.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption (`encryption`)
//! - Argon2id key derivation and master-password hashing (`kdf`)
//! - X25519 keypairs, armoring, sealed envelopes, and password wrapping
//!   of secret keys (`keypair`)

pub mod encryption;
pub mod kdf;
pub mod keypair;

// Re-export the most commonly used items.
pub use encryption::{decrypt, encrypt};
pub use kdf::{
    derive_container_key, derive_container_key_with_params, generate_salt, hash_master_password,
    verify_master_password, Argon2Params,
};
pub use keypair::{armor_public, armor_secret, unarmor_public, unarmor_secret, Keypair};
