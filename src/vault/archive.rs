//! Packaging of a staging area into a single byte stream and back.
//!
//! The archive travels only inside an encrypted container, so the format
//! stays deliberately simple — a magic prefix followed by repeated
//! length-prefixed entries:
//!
//! ```text
//! [CFAR: 4 bytes][version: 1 byte]
//! ( [name_len: u32 LE][name UTF-8][data_len: u64 LE][data] )*
//! ```
//!
//! Entry names are staging-relative (`metadata.db`, `files/<blob>`).
//! Unpacking rejects any name that would escape the destination
//! directory.

use std::fs;
use std::path::Path;

use crate::errors::{CofferError, Result};
use crate::vault::staging::{StagingArea, FILES_DIR, STORE_FILE};

/// Magic bytes at the start of every archive.
const MAGIC: &[u8; 4] = b"CFAR";

/// Current archive format version.
const CURRENT_VERSION: u8 = 1;

/// Package the staging area's metadata store plus the given blobs.
///
/// `blob_names` is the reconciled set the caller wants sealed — names
/// relative to `files/`.  A vault that never held files simply passes an
/// empty slice.
pub fn pack(staging: &StagingArea, blob_names: &[String]) -> Result<Vec<u8>> {
    let store_path = staging.store_path();
    if !store_path.exists() {
        return Err(CofferError::CorruptVault(format!(
            "{STORE_FILE} not found in staging area"
        )));
    }

    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.push(CURRENT_VERSION);

    append_entry(&mut buf, STORE_FILE, &fs::read(&store_path)?)?;

    for name in blob_names {
        let blob_path = staging.files_dir().join(name);
        let data = fs::read(&blob_path)?;
        append_entry(&mut buf, &format!("{FILES_DIR}/{name}"), &data)?;
    }

    Ok(buf)
}

/// Unpack an archive into a staging area.
///
/// Creates `files/` as needed.  Malformed input maps to `CorruptVault` —
/// an archive only exists behind a successful container decryption, so a
/// parse failure means the vault body is damaged.
pub fn unpack(archive: &[u8], staging: &StagingArea) -> Result<()> {
    if archive.len() < 5 || &archive[0..4] != MAGIC {
        return Err(CofferError::CorruptVault(
            "decrypted body is not a Coffer archive".into(),
        ));
    }
    if archive[4] != CURRENT_VERSION {
        return Err(CofferError::CorruptVault(format!(
            "unsupported archive version {}, expected {CURRENT_VERSION}",
            archive[4]
        )));
    }

    let mut cursor = 5usize;
    while cursor < archive.len() {
        let (name, data, next) = read_entry(archive, cursor)?;
        cursor = next;

        validate_entry_name(&name)?;

        let dest = staging.path().join(&name);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, data)?;
    }

    Ok(())
}

fn append_entry(buf: &mut Vec<u8>, name: &str, data: &[u8]) -> Result<()> {
    let name_bytes = name.as_bytes();
    let name_len = u32::try_from(name_bytes.len()).map_err(|_| {
        CofferError::SerializationError(format!("entry name too long: {name}"))
    })?;

    buf.extend_from_slice(&name_len.to_le_bytes());
    buf.extend_from_slice(name_bytes);
    buf.extend_from_slice(&(data.len() as u64).to_le_bytes());
    buf.extend_from_slice(data);
    Ok(())
}

fn read_entry(archive: &[u8], mut cursor: usize) -> Result<(String, &[u8], usize)> {
    let corrupt = |what: &str| CofferError::CorruptVault(format!("archive truncated in {what}"));

    if cursor + 4 > archive.len() {
        return Err(corrupt("entry name length"));
    }
    let name_len = u32::from_le_bytes(archive[cursor..cursor + 4].try_into().unwrap()) as usize;
    cursor += 4;

    if cursor + name_len > archive.len() {
        return Err(corrupt("entry name"));
    }
    let name = std::str::from_utf8(&archive[cursor..cursor + name_len])
        .map_err(|_| CofferError::CorruptVault("archive entry name is not UTF-8".into()))?
        .to_string();
    cursor += name_len;

    if cursor + 8 > archive.len() {
        return Err(corrupt("entry data length"));
    }
    let data_len = u64::from_le_bytes(archive[cursor..cursor + 8].try_into().unwrap());
    cursor += 8;

    let data_len = usize::try_from(data_len)
        .map_err(|_| CofferError::CorruptVault("archive entry exceeds address space".into()))?;
    if cursor + data_len > archive.len() {
        return Err(corrupt("entry data"));
    }
    let data = &archive[cursor..cursor + data_len];
    cursor += data_len;

    Ok((name, data, cursor))
}

/// Entry names come from inside the (authenticated) container, but a
/// hostile container must still not write outside the staging area.
fn validate_entry_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.starts_with('/')
        || name.starts_with('\\')
        || name.contains("..")
        || name.contains(':');
    if bad {
        return Err(CofferError::CorruptVault(format!(
            "archive entry has unsafe name: {name}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn staging_with_store(contents: &[u8]) -> (TempDir, StagingArea) {
        let root = TempDir::new().unwrap();
        let staging = StagingArea::create(root.path()).unwrap();
        fs::write(staging.store_path(), contents).unwrap();
        (root, staging)
    }

    #[test]
    fn pack_unpack_roundtrip_with_blobs() {
        let (_root, staging) = staging_with_store(b"the database");
        staging.ensure_files_dir().unwrap();
        fs::write(staging.files_dir().join("a.enc"), b"blob a").unwrap();
        fs::write(staging.files_dir().join("b.enc"), b"blob b").unwrap();

        let archive = pack(&staging, &["a.enc".into(), "b.enc".into()]).unwrap();

        let dest_root = TempDir::new().unwrap();
        let dest = StagingArea::create(dest_root.path()).unwrap();
        unpack(&archive, &dest).unwrap();

        assert_eq!(fs::read(dest.store_path()).unwrap(), b"the database");
        assert_eq!(fs::read(dest.files_dir().join("a.enc")).unwrap(), b"blob a");
        assert_eq!(fs::read(dest.files_dir().join("b.enc")).unwrap(), b"blob b");
    }

    #[test]
    fn pack_tolerates_no_files_dir() {
        let (_root, staging) = staging_with_store(b"empty vault");
        let archive = pack(&staging, &[]).unwrap();

        let dest_root = TempDir::new().unwrap();
        let dest = StagingArea::create(dest_root.path()).unwrap();
        unpack(&archive, &dest).unwrap();
        assert_eq!(fs::read(dest.store_path()).unwrap(), b"empty vault");
    }

    #[test]
    fn pack_requires_store_file() {
        let root = TempDir::new().unwrap();
        let staging = StagingArea::create(root.path()).unwrap();
        assert!(matches!(
            pack(&staging, &[]),
            Err(CofferError::CorruptVault(_))
        ));
    }

    #[test]
    fn unpack_rejects_garbage() {
        let root = TempDir::new().unwrap();
        let staging = StagingArea::create(root.path()).unwrap();
        assert!(matches!(
            unpack(b"definitely not an archive", &staging),
            Err(CofferError::CorruptVault(_))
        ));
    }

    #[test]
    fn unpack_rejects_truncated_entry() {
        let (_root, staging) = staging_with_store(b"db");
        let mut archive = pack(&staging, &[]).unwrap();
        archive.truncate(archive.len() - 1);

        let dest_root = TempDir::new().unwrap();
        let dest = StagingArea::create(dest_root.path()).unwrap();
        assert!(matches!(
            unpack(&archive, &dest),
            Err(CofferError::CorruptVault(_))
        ));
    }

    #[test]
    fn unpack_rejects_escaping_names() {
        let mut archive = Vec::new();
        archive.extend_from_slice(MAGIC);
        archive.push(CURRENT_VERSION);
        append_entry(&mut archive, "../evil", b"payload").unwrap();

        let root = TempDir::new().unwrap();
        let staging = StagingArea::create(root.path()).unwrap();
        assert!(matches!(
            unpack(&archive, &staging),
            Err(CofferError::CorruptVault(_))
        ));
    }
}
