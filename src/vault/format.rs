//! Binary container file format.
//!
//! A `.vault` container has this layout:
//!
//! ```text
//! [CFFR: 4 bytes][version: 1 byte][salt: 32 bytes][argon2 params: 12 bytes LE][nonce + ciphertext]
//! ```
//!
//! - **Magic** (`CFFR`): identifies the file as a Coffer container.
//! - **Version**: format version (currently `1`).
//! - **Salt**: Argon2id salt for the container key.
//! - **Params**: memory KiB, iterations, parallelism as little-endian
//!   u32s, stored so the exact same KDF settings are used on re-open.
//! - **Body**: the packaged staging archive, AES-256-GCM encrypted with
//!   the derived container key (12-byte nonce prepended, see
//!   `crypto::encryption`).
//!
//! Everything after the fixed prefix is opaque ciphertext; a reader that
//! fails the AEAD check learns nothing about the archive inside.

use std::fs;
use std::path::Path;

use zeroize::Zeroize;

use crate::crypto::encryption;
use crate::crypto::kdf::{self, Argon2Params, SALT_LEN};
use crate::errors::{CofferError, Result};

/// Magic bytes at the start of every container file.
const MAGIC: &[u8; 4] = b"CFFR";

/// Current binary format version.
pub const CURRENT_VERSION: u8 = 1;

/// Fixed-size prefix: 4 (magic) + 1 (version) + 32 (salt) + 12 (params).
const PREFIX_LEN: usize = 4 + 1 + SALT_LEN + 12;

/// Encrypt `archive` with `password` and write the container to `path`
/// **atomically**.
///
/// 1. Generate a fresh salt and derive the container key.
/// 2. Encrypt the archive.
/// 3. Write to a temp file in the same directory.
/// 4. Rename the temp file over the target path.
///
/// The rename ensures a failed seal never leaves a truncated container —
/// readers see either the old file or the new one, never a partial write.
pub fn write_container(
    path: &Path,
    password: &[u8],
    params: &Argon2Params,
    archive: &[u8],
) -> Result<()> {
    let salt = kdf::generate_salt();
    let mut key = kdf::derive_container_key_with_params(password, &salt, params)?;

    let body = encryption::encrypt(&key, archive);
    key.zeroize();
    let body = body?;

    let mut buf = Vec::with_capacity(PREFIX_LEN + body.len());
    buf.extend_from_slice(MAGIC);
    buf.push(CURRENT_VERSION);
    buf.extend_from_slice(&salt);
    buf.extend_from_slice(&params.memory_kib.to_le_bytes());
    buf.extend_from_slice(&params.iterations.to_le_bytes());
    buf.extend_from_slice(&params.parallelism.to_le_bytes());
    buf.extend_from_slice(&body);

    // Atomic write: temp file in the same directory, then rename, so the
    // replace cannot cross a filesystem boundary.
    let parent = path.parent().unwrap_or(Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    fs::write(&tmp_path, &buf)?;
    fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Read a container from `path` and decrypt it with `password`.
///
/// Three failures are kept distinct for the open pipeline:
/// - `VaultNotFound` — no file at `path`;
/// - `CorruptVault` — the prefix is not a valid Coffer container;
/// - `DecryptionFailed` — the AEAD check failed (wrong password, or a
///   damaged body; the two are indistinguishable by construction).
pub fn read_container(path: &Path, password: &[u8]) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(CofferError::VaultNotFound(path.to_path_buf()));
    }

    let data = fs::read(path)?;

    if data.len() < PREFIX_LEN + encryption::NONCE_LEN {
        return Err(CofferError::CorruptVault(
            "file too small to be a valid container".into(),
        ));
    }

    if &data[0..4] != MAGIC {
        return Err(CofferError::CorruptVault("missing CFFR magic bytes".into()));
    }

    let version = data[4];
    if version != CURRENT_VERSION {
        return Err(CofferError::CorruptVault(format!(
            "unsupported container version {version}, expected {CURRENT_VERSION}"
        )));
    }

    let salt = &data[5..5 + SALT_LEN];
    let mut cursor = 5 + SALT_LEN;
    let mut next_u32 = |data: &[u8]| {
        let v = u32::from_le_bytes(data[cursor..cursor + 4].try_into().unwrap());
        cursor += 4;
        v
    };
    let params = Argon2Params {
        memory_kib: next_u32(&data),
        iterations: next_u32(&data),
        parallelism: next_u32(&data),
    };

    let mut key = kdf::derive_container_key_with_params(password, salt, &params)?;
    let archive = encryption::decrypt(&key, &data[PREFIX_LEN..]);
    key.zeroize();

    archive
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.vault");
        let params = Argon2Params {
            memory_kib: 8_192,
            iterations: 1,
            parallelism: 1,
        };

        write_container(&path, b"pw", &params, b"archive bytes").unwrap();
        assert_eq!(read_container(&path, b"pw").unwrap(), b"archive bytes");
    }

    #[test]
    fn wrong_password_is_decryption_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.vault");
        let params = Argon2Params {
            memory_kib: 8_192,
            iterations: 1,
            parallelism: 1,
        };

        write_container(&path, b"right", &params, b"archive").unwrap();
        assert!(matches!(
            read_container(&path, b"wrong"),
            Err(CofferError::DecryptionFailed)
        ));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.vault");
        assert!(matches!(
            read_container(&path, b"pw"),
            Err(CofferError::VaultNotFound(_))
        ));
    }

    #[test]
    fn garbage_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.vault");
        std::fs::write(&path, b"not a container at all, but long enough to pass the size check")
            .unwrap();
        assert!(matches!(
            read_container(&path, b"pw"),
            Err(CofferError::CorruptVault(_))
        ));
    }

    #[test]
    fn overwrite_is_atomic_replace() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.vault");
        let params = Argon2Params {
            memory_kib: 8_192,
            iterations: 1,
            parallelism: 1,
        };

        write_container(&path, b"pw", &params, b"first").unwrap();
        write_container(&path, b"pw", &params, b"second").unwrap();
        assert_eq!(read_container(&path, b"pw").unwrap(), b"second");

        // No temp file left behind.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
