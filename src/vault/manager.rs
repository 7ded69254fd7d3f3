//! The operations surface consumed by an external UI/IPC layer.
//!
//! `VaultManager` owns at most one `Session` — the crate supports
//! exactly one open vault per process — behind a mutex that serializes
//! every container operation.  Two rapid mutations can never interleave
//! their seals, and `open` while a session exists fails with
//! `AlreadyOpen` instead of silently replacing it.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::Settings;
use crate::errors::{CofferError, Result};
use crate::store::{
    Counts, FileReference, Group, KeyRecord, NewPasswordEntry, PasswordEntry, PasswordEntryUpdate,
};
use crate::vault::session::Session;

/// Single-open-vault coordinator.
pub struct VaultManager {
    settings: Settings,
    session: Mutex<Option<Session>>,
}

impl VaultManager {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            session: Mutex::new(None),
        }
    }

    /// The settings this manager was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ------------------------------------------------------------------
    // Container lifecycle
    // ------------------------------------------------------------------

    /// Create a vault at `path` and leave it open.
    pub fn create_vault(&self, path: &Path, master_password: &str) -> Result<()> {
        let mut guard = self.lock();
        if guard.is_some() {
            return Err(CofferError::AlreadyOpen);
        }

        let session = Session::create(path, master_password, &self.settings)?;
        *guard = Some(session);
        Ok(())
    }

    /// Open the vault at `path`.
    pub fn open_vault(&self, path: &Path, master_password: &str) -> Result<()> {
        let mut guard = self.lock();
        if guard.is_some() {
            return Err(CofferError::AlreadyOpen);
        }

        let session = Session::open(path, master_password, &self.settings)?;
        *guard = Some(session);
        Ok(())
    }

    /// Seal and close the open vault.  A no-op when nothing is open.
    ///
    /// Runs under the configured close timeout so an unresponsive flush
    /// cannot hang process shutdown.
    pub fn close_vault(&self) -> Result<()> {
        // The lock is held for the whole close so no open/seal can
        // interleave with the final container write.
        let mut guard = self.lock();
        match guard.take() {
            Some(session) => session.close_with_timeout(self.settings.close_timeout()),
            None => Ok(()),
        }
    }

    /// Explicit durable save of the open vault; the vault stays open.
    pub fn manual_save(&self) -> Result<()> {
        self.with_session(|s| s.manual_save())
    }

    /// True when a vault is currently open.
    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Display name of the open vault (container file stem).
    pub fn vault_name(&self) -> Result<String> {
        self.with_session(|s| Ok(s.name()))
    }

    /// Aggregate record counts of the open vault.
    pub fn counts(&self) -> Result<Counts> {
        self.with_session(|s| s.counts())
    }

    // ------------------------------------------------------------------
    // Password entries
    // ------------------------------------------------------------------

    pub fn add_password(&self, entry: &NewPasswordEntry) -> Result<i64> {
        self.with_session(|s| s.add_password(entry))
    }

    pub fn update_password(&self, id: i64, update: &PasswordEntryUpdate) -> Result<()> {
        self.with_session(|s| s.update_password(id, update))
    }

    pub fn delete_password(&self, id: i64) -> Result<()> {
        self.with_session(|s| s.delete_password(id))
    }

    pub fn list_passwords(&self) -> Result<Vec<PasswordEntry>> {
        self.with_session(|s| s.list_passwords())
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    pub fn stage_file(&self, source: &Path, move_semantics: bool) -> Result<FileReference> {
        self.with_session(|s| s.stage_file(source, move_semantics))
    }

    pub fn export_file(&self, id: i64, dest: &Path) -> Result<()> {
        self.with_session(|s| s.export_file(id, dest))
    }

    pub fn verify_file(&self, id: i64) -> Result<()> {
        self.with_session(|s| s.verify_file(id))
    }

    pub fn rename_file(&self, id: i64, original_name: &str) -> Result<()> {
        self.with_session(|s| s.rename_file(id, original_name))
    }

    pub fn delete_file(&self, id: i64) -> Result<()> {
        self.with_session(|s| s.delete_file(id))
    }

    pub fn list_files(&self) -> Result<Vec<FileReference>> {
        self.with_session(|s| s.list_files())
    }

    // ------------------------------------------------------------------
    // Key records
    // ------------------------------------------------------------------

    pub fn generate_keypair(
        &self,
        base_name: &str,
        user_name: &str,
        email: Option<&str>,
    ) -> Result<(i64, i64)> {
        self.with_session(|s| s.generate_keypair(base_name, user_name, email))
    }

    pub fn import_key(&self, name: &str, armored: &str) -> Result<i64> {
        self.with_session(|s| s.import_key(name, armored))
    }

    pub fn export_key(&self, id: i64, dest: &Path) -> Result<()> {
        self.with_session(|s| s.export_key(id, dest))
    }

    pub fn delete_key(&self, id: i64) -> Result<()> {
        self.with_session(|s| s.delete_key(id))
    }

    pub fn list_keys(&self) -> Result<Vec<KeyRecord>> {
        self.with_session(|s| s.list_keys())
    }

    pub fn encrypt_text(&self, key_id: i64, text: &str) -> Result<String> {
        self.with_session(|s| s.encrypt_text(key_id, text))
    }

    pub fn decrypt_text(&self, key_id: i64, message: &str) -> Result<String> {
        self.with_session(|s| s.decrypt_text(key_id, message))
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    pub fn add_group(&self, name: &str) -> Result<i64> {
        self.with_session(|s| s.add_group(name))
    }

    pub fn delete_group(&self, id: i64) -> Result<()> {
        self.with_session(|s| s.delete_group(id))
    }

    pub fn list_groups(&self) -> Result<Vec<Group>> {
        self.with_session(|s| s.list_groups())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        // A poisoned lock means another thread panicked mid-operation;
        // the session state itself is still structurally sound.
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_session<T>(&self, f: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let session = guard.as_mut().ok_or(CofferError::NoOpenVault)?;
        f(session)
    }
}

/// Build the conventional container path for a vault name:
/// `<dir>/<name>.vault`.
pub fn vault_file_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.vault"))
}
