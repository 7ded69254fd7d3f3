//! Per-file encryptor.
//!
//! Each stored file is individually encrypted with the vault's public
//! key before it touches the staging area, so blobs are protected even
//! inside the (already encrypted) sealed container, and a staged blob
//! on its own is useless without the vault's private key.
//!
//! The on-disk name of a blob is random hex plus the original
//! extension — a directory listing of `files/` identifies nothing about
//! the vault's contents beyond file types.

use std::fs;
use std::path::{Path, PathBuf};

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::crypto::keypair;
use crate::errors::{CofferError, Result};

/// Random bytes in a stored name (hex-encoded to 24 chars).
const STORED_NAME_LEN: usize = 12;

/// Metadata produced by staging a file, for the caller to persist as a
/// file reference.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub original_name: String,
    pub stored_name: String,
    /// SHA-256 hex of the plaintext.
    pub hash: String,
}

/// Encrypts, decrypts, and manages the blobs under a staging area's
/// `files/` directory.
///
/// Holds the vault keypair halves it has been given; operations that
/// need a missing half fail with `NoVaultKey` rather than touching any
/// ciphertext.
pub struct BlobStore {
    files_dir: PathBuf,
    public: Option<PublicKey>,
    secret: Option<StaticSecret>,
}

impl BlobStore {
    pub fn new(
        files_dir: PathBuf,
        public: Option<PublicKey>,
        secret: Option<StaticSecret>,
    ) -> Self {
        Self {
            files_dir,
            public,
            secret,
        }
    }

    /// Encrypt `source` into the staging area.
    ///
    /// Computes the plaintext hash, generates a non-identifying stored
    /// name, writes the sealed blob, and — when `move_semantics` — removes
    /// the source file afterwards.  Returns the metadata the caller
    /// persists via the metadata store.
    pub fn stage(
        &self,
        source: &Path,
        original_name: &str,
        move_semantics: bool,
    ) -> Result<StagedFile> {
        let public = self.public.as_ref().ok_or(CofferError::NoVaultKey)?;

        let plaintext = fs::read(source)?;
        let hash = hex::encode(Sha256::digest(&plaintext));
        let stored_name = generate_stored_name(original_name);

        let sealed = keypair::seal(public, &plaintext)?;

        fs::create_dir_all(&self.files_dir)?;
        fs::write(self.files_dir.join(&stored_name), sealed)?;

        if move_semantics {
            fs::remove_file(source)?;
        }

        Ok(StagedFile {
            original_name: original_name.to_string(),
            stored_name,
            hash,
        })
    }

    /// Decrypt a staged blob back to its plaintext bytes.
    pub fn materialize(&self, stored_name: &str) -> Result<Vec<u8>> {
        let secret = self.secret.as_ref().ok_or(CofferError::NoVaultKey)?;

        let path = self.files_dir.join(stored_name);
        if !path.exists() {
            return Err(CofferError::BlobNotFound(stored_name.to_string()));
        }

        let sealed = fs::read(&path)?;
        keypair::open(secret, &sealed)
    }

    /// Materialize a blob and compare its hash against the recorded one.
    ///
    /// Deliberately not part of the ordinary read path — decrypt-and-hash
    /// is expensive, so corruption detection is on demand.
    pub fn verify_integrity(&self, stored_name: &str, expected_hash: &str) -> Result<()> {
        let plaintext = self.materialize(stored_name)?;
        let actual = hex::encode(Sha256::digest(&plaintext));

        if bool::from(actual.as_bytes().ct_eq(expected_hash.as_bytes())) {
            Ok(())
        } else {
            Err(CofferError::IntegrityMismatch(stored_name.to_string()))
        }
    }

    /// Materialize a blob and write the plaintext to `dest`.
    pub fn export(&self, stored_name: &str, dest: &Path) -> Result<()> {
        let plaintext = self.materialize(stored_name)?;
        fs::write(dest, plaintext)?;
        Ok(())
    }

    /// Remove a blob. Idempotent: an already-absent blob is not an error.
    pub fn delete(&self, stored_name: &str) -> Result<()> {
        let path = self.files_dir.join(stored_name);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// Random stored name carrying only the original extension.
fn generate_stored_name(original_name: &str) -> String {
    let mut random = [0u8; STORED_NAME_LEN];
    rand::rngs::OsRng.fill_bytes(&mut random);
    let stem = hex::encode(random);

    match Path::new(original_name).extension() {
        Some(ext) => format!("{stem}.{}", ext.to_string_lossy()),
        None => stem,
    }
}
