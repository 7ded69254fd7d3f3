//! The open-vault session.
//!
//! A `Session` is the explicit value representing one open vault: it
//! owns the staging area, the metadata store handle, the unwrapped
//! vault keypair, and the master secret.  Every operation threads
//! through it — there is no ambient "current vault" anywhere in the
//! crate, and "no open vault" is a typed absence at the manager level
//! rather than a null check.
//!
//! Open is a linear pipeline of fallible stages — check lockout, read
//! and decrypt the container, unpack, open the store, verify the stored
//! hash, unwrap the keypair — with a single rollback: any failure drops
//! the staging area, which purges itself.  No partially open vault ever
//! escapes this module.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::config::Settings;
use crate::crypto::kdf::{self, Argon2Params};
use crate::errors::{CofferError, Result};
use crate::files::BlobStore;
use crate::keys;
use crate::lockout::LockoutTracker;
use crate::store::{
    Counts, FileReference, Group, KeyRecord, MetadataStore, NewPasswordEntry, PasswordEntry,
    PasswordEntryUpdate,
};
use crate::vault::{archive, format, staging::StagingArea};

/// One open vault.
pub struct Session {
    container_path: PathBuf,
    staging: StagingArea,
    store: MetadataStore,
    blobs: BlobStore,
    master: Zeroizing<String>,
    argon2: Argon2Params,
    /// Set when an automatic seal after a mutation failed; the next seal
    /// opportunity retries.
    needs_reseal: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("container_path", &self.container_path)
            .field("needs_reseal", &self.needs_reseal)
            .finish_non_exhaustive()
    }
}

impl Session {
    // ------------------------------------------------------------------
    // Create / Open
    // ------------------------------------------------------------------

    /// Create a brand-new vault at `path` and return the open session.
    ///
    /// Builds the staging area, an empty metadata store with the auth
    /// record and Default group, the vault keypair, and the first sealed
    /// container.  Any failure purges the staging area before returning.
    pub fn create(path: &Path, master_password: &str, settings: &Settings) -> Result<Self> {
        if path.exists() {
            return Err(CofferError::VaultAlreadyExists(path.to_path_buf()));
        }

        let staging = StagingArea::create(&settings.staging_root)?;
        let argon2 = settings.argon2_params();

        // Staging drops (and purges itself) on every `?` below.
        let store = MetadataStore::create(&staging.store_path(), master_password)?;

        let hash = kdf::hash_master_password(master_password.as_bytes())?;
        store.set_master_hash(&hash)?;

        let vault_keys = keys::establish(&store, master_password, &argon2)?;

        staging.ensure_files_dir()?;
        let blobs = BlobStore::new(
            staging.files_dir(),
            Some(vault_keys.public),
            Some(vault_keys.secret),
        );

        let mut session = Self {
            container_path: path.to_path_buf(),
            staging,
            store,
            blobs,
            master: Zeroizing::new(master_password.to_string()),
            argon2,
            needs_reseal: false,
        };

        session
            .seal()
            .map_err(|e| CofferError::CreationError(e.to_string()))?;

        debug!(vault = %path.display(), "vault created");
        Ok(session)
    }

    /// Open an existing vault at `path` and return the session.
    ///
    /// Attempt accounting wraps the two password checks: the container
    /// decryption and the independently stored master-password hash.
    /// Both checks are load-bearing — the hash check catches a container
    /// layer that decrypts but carries a foreign store.
    pub fn open(path: &Path, master_password: &str, settings: &Settings) -> Result<Self> {
        let tracker = LockoutTracker::from_settings(settings);

        let status = tracker.check(path)?;
        if status.locked {
            return Err(CofferError::LockedOut {
                remaining_seconds: status.remaining_seconds,
            });
        }

        let archive_bytes = match format::read_container(path, master_password.as_bytes()) {
            Ok(bytes) => bytes,
            Err(CofferError::DecryptionFailed) => {
                return Err(failed_attempt(&tracker, path));
            }
            Err(other) => return Err(other),
        };

        let staging = StagingArea::create(&settings.staging_root)?;
        archive::unpack(&archive_bytes, &staging)?;

        // The container layer already vouched for the password, so a
        // store that rejects the same key is damaged, not mis-keyed.
        let store = match MetadataStore::open(&staging.store_path(), master_password) {
            Ok(store) => store,
            Err(CofferError::DecryptionFailed) => {
                return Err(CofferError::CorruptVault(
                    "metadata store does not accept the container password".into(),
                ));
            }
            Err(other) => return Err(other),
        };

        let auth = store.auth_record()?;
        let stored_hash = auth.master_hash.ok_or_else(|| {
            CofferError::CorruptVault("auth record is missing the master-password hash".into())
        })?;
        if !kdf::verify_master_password(master_password.as_bytes(), &stored_hash)? {
            return Err(failed_attempt(&tracker, path));
        }

        let vault_keys = keys::load(&store, master_password)?;

        tracker.reset(path)?;

        staging.ensure_files_dir()?;
        let blobs = BlobStore::new(
            staging.files_dir(),
            Some(vault_keys.public),
            Some(vault_keys.secret),
        );

        debug!(vault = %path.display(), "vault opened");
        Ok(Self {
            container_path: path.to_path_buf(),
            staging,
            store,
            blobs,
            master: Zeroizing::new(master_password.to_string()),
            argon2: settings.argon2_params(),
            needs_reseal: false,
        })
    }

    // ------------------------------------------------------------------
    // Seal / Close
    // ------------------------------------------------------------------

    /// Repackage the staging area and atomically overwrite the container.
    ///
    /// The blobs that travel are reconciled between the `files/` listing
    /// and the live file references — never an in-memory cache: a blob
    /// without a row is dropped, a row without a blob is logged and
    /// skipped.
    pub fn seal(&mut self) -> Result<()> {
        self.store.checkpoint();

        let on_disk = self.staging.list_blobs()?;
        let referenced = self.store.stored_names()?;

        for name in &referenced {
            if !on_disk.contains(name) {
                warn!(blob = %name, "file reference has no staged blob; sealing without it");
            }
        }
        let blobs: Vec<String> = on_disk
            .into_iter()
            .filter(|name| referenced.contains(name))
            .collect();

        let archive_bytes = archive::pack(&self.staging, &blobs)?;
        format::write_container(
            &self.container_path,
            self.master.as_bytes(),
            &self.argon2,
            &archive_bytes,
        )?;

        self.needs_reseal = false;
        debug!(vault = %self.container_path.display(), blobs = blobs.len(), "vault sealed");
        Ok(())
    }

    /// Explicit durable save: flush the store, then seal.  The staging
    /// area stays — the vault remains open.
    pub fn manual_save(&mut self) -> Result<()> {
        self.seal()
    }

    /// Flush, seal, and purge the staging area.
    ///
    /// The staging area is purged even when the final seal fails: a
    /// staging directory must never outlive the open state, so the
    /// failure is returned but not allowed to strand plaintext on disk.
    pub fn close(mut self) -> Result<()> {
        let seal_result = self.seal();
        if let Err(ref e) = seal_result {
            warn!(vault = %self.container_path.display(), error = %e,
                  "final seal failed during close; staged changes since the last seal are lost");
        }

        let Session {
            store, mut staging, ..
        } = self;
        store.close();
        staging.purge();

        seal_result
    }

    /// Close with a hard deadline, for application shutdown.
    ///
    /// The close runs on a worker thread; when the deadline elapses the
    /// worker is abandoned and `CloseTimeout` is returned so shutdown
    /// can proceed.  An abandoned seal is an accepted data-loss risk and
    /// is logged, never silent.
    pub fn close_with_timeout(self, timeout: Duration) -> Result<()> {
        let vault = self.container_path.display().to_string();
        let (tx, rx) = mpsc::channel();

        let worker = thread::spawn(move || {
            let _ = tx.send(self.close());
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => {
                let _ = worker.join();
                result
            }
            Err(_) => {
                warn!(vault = %vault, timeout_secs = timeout.as_secs(),
                      "close timed out; shutdown proceeds without a final seal");
                Err(CofferError::CloseTimeout)
            }
        }
    }

    /// Seal after a mutation.  Failure is a logged warning, not an error
    /// for the mutation itself — the staged state is already correct,
    /// and the dirty flag forces a retry at the next opportunity.
    fn autosave(&mut self) {
        if let Err(e) = self.seal() {
            self.needs_reseal = true;
            warn!(vault = %self.container_path.display(), error = %e,
                  "automatic seal after mutation failed; will retry at next save");
        }
    }

    /// True when a failed automatic seal is still pending a retry.
    pub fn needs_reseal(&self) -> bool {
        self.needs_reseal
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Path of the sealed container file.
    pub fn container_path(&self) -> &Path {
        &self.container_path
    }

    /// The vault's display name — the container file stem.
    pub fn name(&self) -> String {
        self.container_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Aggregate record counts.
    pub fn counts(&self) -> Result<Counts> {
        self.store.counts()
    }

    // ------------------------------------------------------------------
    // Password entries
    // ------------------------------------------------------------------

    pub fn add_password(&mut self, entry: &NewPasswordEntry) -> Result<i64> {
        let id = self.store.add_password(entry)?;
        self.autosave();
        Ok(id)
    }

    pub fn update_password(&mut self, id: i64, update: &PasswordEntryUpdate) -> Result<()> {
        self.store.update_password(id, update)?;
        self.autosave();
        Ok(())
    }

    pub fn delete_password(&mut self, id: i64) -> Result<()> {
        self.store.delete_password(id)?;
        self.autosave();
        Ok(())
    }

    pub fn list_passwords(&self) -> Result<Vec<PasswordEntry>> {
        self.store.list_passwords()
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// Encrypt `source` into the vault and record a file reference.
    pub fn stage_file(&mut self, source: &Path, move_semantics: bool) -> Result<FileReference> {
        let original_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                CofferError::SerializationError(format!(
                    "source path has no file name: {}",
                    source.display()
                ))
            })?;

        let staged = self.blobs.stage(source, &original_name, move_semantics)?;
        let id = self
            .store
            .add_file(&staged.original_name, &staged.stored_name, &staged.hash)?;
        self.autosave();
        self.store.get_file(id)
    }

    /// Decrypt a stored file back to its plaintext bytes.
    pub fn materialize_file(&self, id: i64) -> Result<Vec<u8>> {
        let file = self.store.get_file(id)?;
        self.blobs.materialize(&file.stored_name)
    }

    /// Decrypt a stored file and write it to `dest`.
    pub fn export_file(&self, id: i64, dest: &Path) -> Result<()> {
        let file = self.store.get_file(id)?;
        self.blobs.export(&file.stored_name, dest)
    }

    /// Materialize and compare against the hash recorded at staging time.
    pub fn verify_file(&self, id: i64) -> Result<()> {
        let file = self.store.get_file(id)?;
        self.blobs.verify_integrity(&file.stored_name, &file.hash)
    }

    /// Change the user-visible name of a file reference; the blob and
    /// its stored name are untouched.
    pub fn rename_file(&mut self, id: i64, original_name: &str) -> Result<()> {
        self.store.rename_file(id, original_name)?;
        self.autosave();
        Ok(())
    }

    /// Remove the blob and its file reference.
    pub fn delete_file(&mut self, id: i64) -> Result<()> {
        let file = self.store.get_file(id)?;
        self.blobs.delete(&file.stored_name)?;
        self.store.delete_file(id)?;
        self.autosave();
        Ok(())
    }

    pub fn list_files(&self) -> Result<Vec<FileReference>> {
        self.store.list_files()
    }

    // ------------------------------------------------------------------
    // Key records
    // ------------------------------------------------------------------

    /// Generate a named user keypair; both halves become key records.
    pub fn generate_keypair(
        &mut self,
        base_name: &str,
        user_name: &str,
        email: Option<&str>,
    ) -> Result<(i64, i64)> {
        let ids = keys::generate_user_keypair(&self.store, base_name, user_name, email)?;
        self.autosave();
        Ok(ids)
    }

    /// Import armored key material as a key record.
    pub fn import_key(&mut self, name: &str, armored: &str) -> Result<i64> {
        let id = keys::import_key(&self.store, name, armored)?;
        self.autosave();
        Ok(id)
    }

    /// Write a key record's armored material to `dest`.
    pub fn export_key(&self, id: i64, dest: &Path) -> Result<()> {
        keys::export_key(&self.store, id, dest)
    }

    pub fn delete_key(&mut self, id: i64) -> Result<()> {
        self.store.delete_key(id)?;
        self.autosave();
        Ok(())
    }

    pub fn list_keys(&self) -> Result<Vec<KeyRecord>> {
        self.store.list_keys()
    }

    /// Encrypt text with a stored public-key record.
    pub fn encrypt_text(&self, key_id: i64, text: &str) -> Result<String> {
        keys::encrypt_with_key(&self.store, key_id, text)
    }

    /// Decrypt an armored message with a stored private-key record.
    pub fn decrypt_text(&self, key_id: i64, message: &str) -> Result<String> {
        keys::decrypt_with_key(&self.store, key_id, message)
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    /// Create a group (or return the existing one with this name).
    pub fn add_group(&mut self, name: &str) -> Result<i64> {
        let id = self.store.ensure_group(name)?;
        self.autosave();
        Ok(id)
    }

    /// Delete a group, reassigning its members to Default.  The Default
    /// group is protected.
    pub fn delete_group(&mut self, id: i64) -> Result<()> {
        self.store.delete_group(id)?;
        self.autosave();
        Ok(())
    }

    pub fn list_groups(&self) -> Result<Vec<Group>> {
        self.store.list_groups()
    }
}

/// Record a failed attempt and convert the outcome into the error the
/// caller surfaces: `LockedOut` when this attempt exhausted the budget,
/// `WrongPassword` with the remaining budget otherwise.
fn failed_attempt(tracker: &LockoutTracker, path: &Path) -> CofferError {
    match tracker.record_failure(path) {
        Ok(outcome) if outcome.locked => CofferError::LockedOut {
            remaining_seconds: outcome.remaining_seconds,
        },
        Ok(outcome) => CofferError::WrongPassword {
            attempts_remaining: Some(outcome.attempts_remaining),
        },
        // The tracker failing to persist must not mask the actual
        // verification failure.
        Err(_) => CofferError::WrongPassword {
            attempts_remaining: None,
        },
    }
}
