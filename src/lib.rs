//! Coffer — a single-user secrets vault.
//!
//! A vault is one opaque file on disk: a password-encrypted archive
//! holding a SQLCipher metadata store (password entries, file
//! references, key records, groups) plus individually encrypted file
//! blobs.  Opening a vault unpacks it into a transient staging area;
//! sealing re-encrypts the staging area back into the container
//! atomically.  A lockout tracker outside the container rate-limits
//! online password guessing.

pub mod config;
pub mod crypto;
pub mod errors;
pub mod files;
pub mod keys;
pub mod lockout;
pub mod store;
pub mod vault;

pub use config::Settings;
pub use errors::{CofferError, Result};
pub use vault::{Session, VaultManager};
