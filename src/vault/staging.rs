//! Staging area lifecycle.
//!
//! A `StagingArea` is the process-local working directory holding a
//! vault's decrypted metadata store and its `files/` blob directory
//! while the vault is open.  It exists only between open/create and
//! seal-failure/close, and is purged — recursively, best-effort — the
//! moment the vault leaves the open state.
//!
//! Each session gets its own randomly named subdirectory under the
//! configured staging root, so parallel tests (or a future multi-vault
//! embedder) never collide.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::RngCore;
use tracing::warn;

use crate::errors::{CofferError, Result};

/// File name of the metadata store inside a staging area.
pub const STORE_FILE: &str = "metadata.db";

/// Directory of encrypted file blobs inside a staging area.
pub const FILES_DIR: &str = "files";

/// Delay before the single purge retry when the platform holds a
/// transient lock on a staged file.
const PURGE_RETRY_DELAY: Duration = Duration::from_millis(250);

/// An exclusively-owned temporary directory for one open vault.
pub struct StagingArea {
    root: PathBuf,
    purged: bool,
}

impl StagingArea {
    /// Create a fresh staging area under `staging_root`.
    pub fn create(staging_root: &Path) -> Result<Self> {
        let mut suffix = [0u8; 8];
        rand::rngs::OsRng.fill_bytes(&mut suffix);
        let root = staging_root.join(format!("session-{}", hex::encode(suffix)));

        fs::create_dir_all(&root).map_err(|e| {
            CofferError::CreationError(format!(
                "cannot create staging directory {}: {e}",
                root.display()
            ))
        })?;

        // Owner-only on Unix: the staging area holds plaintext metadata.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o700);
            let _ = fs::set_permissions(&root, perms);
        }

        Ok(Self {
            root,
            purged: false,
        })
    }

    /// Path of this staging area's root directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Path of the metadata store file.
    pub fn store_path(&self) -> PathBuf {
        self.root.join(STORE_FILE)
    }

    /// Path of the `files/` blob directory.
    pub fn files_dir(&self) -> PathBuf {
        self.root.join(FILES_DIR)
    }

    /// Create `files/` if it does not exist yet.
    pub fn ensure_files_dir(&self) -> Result<()> {
        let dir = self.files_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// List the blob names currently present in `files/`.
    ///
    /// An absent `files/` directory (a vault that never held files) is an
    /// empty listing, not an error.
    pub fn list_blobs(&self) -> Result<Vec<String>> {
        let dir = self.files_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Recursively delete the staging directory.
    ///
    /// A transiently locked file (common on Windows when a scanner still
    /// holds a staged blob) gets one delayed retry; after that the
    /// leftover is logged and abandoned rather than failing the close.
    pub fn purge(&mut self) {
        if self.purged || !self.root.exists() {
            self.purged = true;
            return;
        }

        if let Err(first) = fs::remove_dir_all(&self.root) {
            std::thread::sleep(PURGE_RETRY_DELAY);
            if let Err(second) = fs::remove_dir_all(&self.root) {
                warn!(
                    staging = %self.root.display(),
                    first_error = %first,
                    retry_error = %second,
                    "failed to purge staging area after retry; leftover directory remains"
                );
                return;
            }
        }
        self.purged = true;
    }
}

impl Drop for StagingArea {
    /// Backstop: a staging area must never outlive its session, even on
    /// an error path that forgot to purge explicitly.
    fn drop(&mut self) {
        self.purge();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_makes_unique_directories() {
        let root = TempDir::new().unwrap();
        let a = StagingArea::create(root.path()).unwrap();
        let b = StagingArea::create(root.path()).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().exists());
        assert!(b.path().exists());
    }

    #[test]
    fn purge_removes_everything() {
        let root = TempDir::new().unwrap();
        let mut staging = StagingArea::create(root.path()).unwrap();
        staging.ensure_files_dir().unwrap();
        fs::write(staging.files_dir().join("blob"), b"data").unwrap();

        let path = staging.path().to_path_buf();
        staging.purge();
        assert!(!path.exists());
    }

    #[test]
    fn drop_purges() {
        let root = TempDir::new().unwrap();
        let path;
        {
            let staging = StagingArea::create(root.path()).unwrap();
            path = staging.path().to_path_buf();
            fs::write(staging.store_path(), b"db").unwrap();
        }
        assert!(!path.exists());
    }

    #[test]
    fn list_blobs_tolerates_missing_files_dir() {
        let root = TempDir::new().unwrap();
        let staging = StagingArea::create(root.path()).unwrap();
        assert!(staging.list_blobs().unwrap().is_empty());
    }

    #[test]
    fn list_blobs_returns_sorted_names() {
        let root = TempDir::new().unwrap();
        let staging = StagingArea::create(root.path()).unwrap();
        staging.ensure_files_dir().unwrap();
        fs::write(staging.files_dir().join("bbb.enc"), b"2").unwrap();
        fs::write(staging.files_dir().join("aaa.enc"), b"1").unwrap();

        assert_eq!(staging.list_blobs().unwrap(), vec!["aaa.enc", "bbb.enc"]);
    }
}
