//! Metadata store — the password-protected relational store inside the
//! staging area.
//!
//! The store is a SQLCipher-encrypted SQLite file, keyed with the master
//! password through rusqlite's typed pragma API.  Its encryption is
//! independent of the container's archive-level encryption: even if the
//! outer layer were misconfigured, the store file itself stays
//! unreadable.
//!
//! Schema bootstrap is idempotent — create-if-missing tables plus
//! add-if-missing columns — so a vault written by an older version
//! upgrades transparently the first time it is opened.

pub mod records;

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::errors::{CofferError, Result};
pub use records::{
    Counts, FileKind, FileReference, Group, KeyKind, KeyRecord, NewPasswordEntry, PasswordEntry,
    PasswordEntryUpdate,
};

/// Reserved id of the protected "Default" group.
pub const DEFAULT_GROUP_ID: i64 = 1;

/// Singleton id of the auth record.
const AUTH_ID: i64 = 1;

/// The vault's auth record: master-password hash plus both halves of the
/// internal keypair (private half password-wrapped).
#[derive(Debug, Clone, Default)]
pub struct AuthRecord {
    pub master_hash: Option<String>,
    pub vault_public_key: Option<String>,
    pub vault_private_key: Option<String>,
}

/// Handle to an open metadata store.
pub struct MetadataStore {
    conn: Connection,
}

impl MetadataStore {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create a brand-new store file at `path`, keyed with
    /// `master_password`, and bootstrap the schema.
    pub fn create(path: &Path, master_password: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| CofferError::CreationError(format!("cannot create staging store: {e}")))?;

        Self::apply_key(&conn, master_password)
            .map_err(|e| CofferError::CreationError(format!("cannot key staging store: {e}")))?;
        Self::apply_pragmas(&conn);

        let store = Self { conn };
        store.bootstrap()?;
        Ok(store)
    }

    /// Open an existing store file with `master_password`.
    ///
    /// A wrong key surfaces from SQLCipher as "file is not a database";
    /// that is reported as `DecryptionFailed` and left to the caller to
    /// classify (the container layer has usually already vouched for the
    /// password by the time this runs).
    pub fn open(path: &Path, master_password: &str) -> Result<Self> {
        if !path.exists() {
            return Err(CofferError::CorruptVault(format!(
                "metadata store missing at {}",
                path.display()
            )));
        }

        let conn = Connection::open(path)?;
        Self::apply_key(&conn, master_password).map_err(|_| CofferError::DecryptionFailed)?;
        Self::apply_pragmas(&conn);

        // Key verification: with the wrong key the header does not parse
        // and the first real read fails.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(()))
            .map_err(|_| CofferError::DecryptionFailed)?;

        let store = Self { conn };
        store.bootstrap()?;
        Ok(store)
    }

    fn apply_key(conn: &Connection, master_password: &str) -> rusqlite::Result<()> {
        // Typed pragma API — the password is never spliced into SQL text.
        conn.pragma_update(None, "key", master_password)
    }

    fn apply_pragmas(conn: &Connection) {
        // DELETE journaling keeps the store a single file for archiving;
        // FULL sync because the store is small and correctness-critical.
        let _ = conn.query_row("PRAGMA journal_mode = DELETE", [], |_| Ok(()));
        let _ = conn.pragma_update(None, "synchronous", "FULL");
    }

    // ------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------

    /// Idempotent schema bootstrap.
    ///
    /// Tables are created in their oldest shape and brought current with
    /// add-if-missing columns, so any historical store upgrades in place.
    fn bootstrap(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS auth (
                id          INTEGER PRIMARY KEY,
                master_hash TEXT
            );
            CREATE TABLE IF NOT EXISTS passwords (
                id     INTEGER PRIMARY KEY,
                label  TEXT,
                secret TEXT
            );
            CREATE TABLE IF NOT EXISTS files (
                id            INTEGER PRIMARY KEY,
                original_name TEXT
            );
            CREATE TABLE IF NOT EXISTS keys (
                id   INTEGER PRIMARY KEY,
                name TEXT,
                kind TEXT
            );
            CREATE TABLE IF NOT EXISTS groups (
                id   INTEGER PRIMARY KEY,
                name TEXT UNIQUE
            );",
        )?;

        self.ensure_columns(
            "auth",
            &[
                ("vault_public_key", "vault_public_key TEXT"),
                ("vault_private_key", "vault_private_key TEXT"),
            ],
        )?;
        self.ensure_columns(
            "passwords",
            &[
                ("group_id", "group_id INTEGER DEFAULT 1"),
                ("address", "address TEXT"),
                ("username", "username TEXT"),
                ("added_date", "added_date TEXT"),
            ],
        )?;
        self.ensure_columns(
            "files",
            &[
                ("stored_name", "stored_name TEXT"),
                ("hash", "hash TEXT"),
                ("added_date", "added_date TEXT"),
            ],
        )?;
        self.ensure_columns(
            "keys",
            &[
                ("material", "material TEXT"),
                ("identity", "identity TEXT"),
                ("added_date", "added_date TEXT"),
            ],
        )?;
        self.ensure_columns("groups", &[("added_date", "added_date TEXT")])?;

        self.conn.execute(
            "INSERT OR IGNORE INTO groups (id, name, added_date) VALUES (?1, 'Default', ?2)",
            rusqlite::params![DEFAULT_GROUP_ID, now()],
        )?;

        Ok(())
    }

    /// Add each missing column of `wanted` (name, DDL) to `table`.
    fn ensure_columns(&self, table: &str, wanted: &[(&str, &str)]) -> Result<()> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let have = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        for (name, ddl) in wanted {
            if !have.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                self.conn
                    .execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {ddl}"))?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Auth record
    // ------------------------------------------------------------------

    /// Store the master-password hash (insert-or-replace, singleton row).
    pub fn set_master_hash(&self, hash: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO auth (id, master_hash) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET master_hash = excluded.master_hash",
            rusqlite::params![AUTH_ID, hash],
        )?;
        Ok(())
    }

    /// Store both halves of the vault keypair in the auth record.
    pub fn set_vault_keys(&self, public_armored: &str, private_wrapped: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO auth (id, vault_public_key, vault_private_key) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                 vault_public_key = excluded.vault_public_key,
                 vault_private_key = excluded.vault_private_key",
            rusqlite::params![AUTH_ID, public_armored, private_wrapped],
        )?;
        Ok(())
    }

    /// Read the auth record; all fields empty when it was never written.
    pub fn auth_record(&self) -> Result<AuthRecord> {
        let row = self
            .conn
            .query_row(
                "SELECT master_hash, vault_public_key, vault_private_key FROM auth WHERE id = ?1",
                [AUTH_ID],
                |row| {
                    Ok(AuthRecord {
                        master_hash: row.get(0)?,
                        vault_public_key: row.get(1)?,
                        vault_private_key: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(row.unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // Password entries
    // ------------------------------------------------------------------

    /// Insert a password entry, resolving (or creating) its group.
    pub fn add_password(&self, entry: &NewPasswordEntry) -> Result<i64> {
        let group_id = match entry.group.as_deref() {
            Some(name) => self.ensure_group(name)?,
            None => DEFAULT_GROUP_ID,
        };

        self.conn.execute(
            "INSERT INTO passwords (label, group_id, address, username, secret, added_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                entry.label,
                group_id,
                entry.address,
                entry.username,
                entry.secret,
                now()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Apply a partial update; untouched fields keep their values.
    pub fn update_password(&self, id: i64, update: &PasswordEntryUpdate) -> Result<()> {
        let mut sets: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref label) = update.label {
            sets.push("label = ?");
            params.push(Box::new(label.clone()));
        }
        if let Some(ref group) = update.group {
            let group_id = self.ensure_group(group)?;
            sets.push("group_id = ?");
            params.push(Box::new(group_id));
        }
        if let Some(ref address) = update.address {
            sets.push("address = ?");
            params.push(Box::new(address.clone()));
        }
        if let Some(ref username) = update.username {
            sets.push("username = ?");
            params.push(Box::new(username.clone()));
        }
        if let Some(ref secret) = update.secret {
            sets.push("secret = ?");
            params.push(Box::new(secret.clone()));
        }

        if sets.is_empty() {
            return Ok(());
        }
        params.push(Box::new(id));

        let sql = format!("UPDATE passwords SET {} WHERE id = ?", sets.join(", "));
        let params_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| &**p).collect();
        let changes = self.conn.execute(&sql, params_refs.as_slice())?;

        if changes == 0 {
            return Err(CofferError::RecordNotFound {
                kind: "password",
                id,
            });
        }
        Ok(())
    }

    pub fn delete_password(&self, id: i64) -> Result<()> {
        let changes = self
            .conn
            .execute("DELETE FROM passwords WHERE id = ?1", [id])?;
        if changes == 0 {
            return Err(CofferError::RecordNotFound {
                kind: "password",
                id,
            });
        }
        Ok(())
    }

    /// All password entries, newest first.
    pub fn list_passwords(&self) -> Result<Vec<PasswordEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.label, COALESCE(g.name, 'Default'), p.address, p.username,
                    p.secret, p.added_date
             FROM passwords p
             LEFT JOIN groups g ON g.id = p.group_id
             ORDER BY p.id DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(PasswordEntry {
                id: row.get(0)?,
                label: row.get(1)?,
                group_name: row.get(2)?,
                address: row.get(3)?,
                username: row.get(4)?,
                secret: row.get(5)?,
                added_date: parse_date(row.get::<_, Option<String>>(6)?),
            })
        })?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Into::into)
    }

    // ------------------------------------------------------------------
    // File references
    // ------------------------------------------------------------------

    /// Insert a file reference for a freshly staged blob.
    pub fn add_file(&self, original_name: &str, stored_name: &str, hash: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO files (original_name, stored_name, hash, added_date)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![original_name, stored_name, hash, now()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_file(&self, id: i64) -> Result<FileReference> {
        self.conn
            .query_row(
                "SELECT id, original_name, stored_name, hash, added_date
                 FROM files WHERE id = ?1",
                [id],
                file_from_row,
            )
            .optional()?
            .ok_or(CofferError::RecordNotFound { kind: "file", id })
    }

    /// Rename the user-visible name of a file reference.
    pub fn rename_file(&self, id: i64, original_name: &str) -> Result<()> {
        let changes = self.conn.execute(
            "UPDATE files SET original_name = ?1 WHERE id = ?2",
            rusqlite::params![original_name, id],
        )?;
        if changes == 0 {
            return Err(CofferError::RecordNotFound { kind: "file", id });
        }
        Ok(())
    }

    pub fn delete_file(&self, id: i64) -> Result<()> {
        let changes = self.conn.execute("DELETE FROM files WHERE id = ?1", [id])?;
        if changes == 0 {
            return Err(CofferError::RecordNotFound { kind: "file", id });
        }
        Ok(())
    }

    /// All file references, newest first.
    pub fn list_files(&self) -> Result<Vec<FileReference>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, original_name, stored_name, hash, added_date
             FROM files ORDER BY id DESC",
        )?;
        let rows = stmt.query_map([], file_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Into::into)
    }

    /// Stored blob names of every live file reference.
    ///
    /// Seal reconciles this against the staging directory listing.
    pub fn stored_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT stored_name FROM files WHERE stored_name IS NOT NULL")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Into::into)
    }

    // ------------------------------------------------------------------
    // Key records
    // ------------------------------------------------------------------

    pub fn add_key(&self, name: &str, kind: KeyKind, material: &str, identity: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO keys (name, kind, material, identity, added_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![name, kind.as_str(), material, identity, now()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_key(&self, id: i64) -> Result<KeyRecord> {
        self.conn
            .query_row(
                "SELECT id, name, kind, material, identity, added_date FROM keys WHERE id = ?1",
                [id],
                key_from_row,
            )
            .optional()?
            .ok_or(CofferError::RecordNotFound { kind: "key", id })
    }

    pub fn delete_key(&self, id: i64) -> Result<()> {
        let changes = self.conn.execute("DELETE FROM keys WHERE id = ?1", [id])?;
        if changes == 0 {
            return Err(CofferError::RecordNotFound { kind: "key", id });
        }
        Ok(())
    }

    /// All key records, newest first.
    pub fn list_keys(&self) -> Result<Vec<KeyRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, kind, material, identity, added_date FROM keys ORDER BY id DESC",
        )?;
        let rows = stmt.query_map([], key_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Into::into)
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    /// Resolve a group name to its id, creating the group when it does
    /// not exist yet.
    pub fn ensure_group(&self, name: &str) -> Result<i64> {
        if let Some(id) = self.group_id_by_name(name)? {
            return Ok(id);
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO groups (name, added_date) VALUES (?1, ?2)",
            rusqlite::params![name, now()],
        )?;
        self.group_id_by_name(name)?
            .ok_or_else(|| CofferError::SerializationError(format!("group '{name}' vanished")))
    }

    fn group_id_by_name(&self, name: &str) -> Result<Option<i64>> {
        self.conn
            .query_row("SELECT id FROM groups WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Into::into)
    }

    /// All groups, alphabetical by name.
    pub fn list_groups(&self) -> Result<Vec<Group>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, added_date FROM groups ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Group {
                id: row.get(0)?,
                name: row.get(1)?,
                added_date: parse_date(row.get::<_, Option<String>>(2)?),
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Into::into)
    }

    /// Delete a group, reassigning its password entries to Default.
    ///
    /// The Default group itself is protected.
    pub fn delete_group(&self, id: i64) -> Result<()> {
        if id == DEFAULT_GROUP_ID {
            return Err(CofferError::ProtectedRecord);
        }

        self.conn.execute(
            "UPDATE passwords SET group_id = ?1 WHERE group_id = ?2",
            rusqlite::params![DEFAULT_GROUP_ID, id],
        )?;
        let changes = self.conn.execute("DELETE FROM groups WHERE id = ?1", [id])?;
        if changes == 0 {
            return Err(CofferError::RecordNotFound { kind: "group", id });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Aggregates and maintenance
    // ------------------------------------------------------------------

    /// Record counts for the dashboard.
    pub fn counts(&self) -> Result<Counts> {
        let count = |sql: &str| -> Result<u64> {
            self.conn
                .query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|n| n.max(0) as u64)
                .map_err(Into::into)
        };

        Ok(Counts {
            passwords: count("SELECT COUNT(*) FROM passwords")?,
            files: count("SELECT COUNT(*) FROM files")?,
            keys: count("SELECT COUNT(*) FROM keys")?,
        })
    }

    /// Flush any journal state back into the main store file.
    ///
    /// Best-effort: sealing reads the file from disk, so a checkpoint
    /// failure degrades to sealing the last durable state.
    pub fn checkpoint(&self) {
        let _ = self
            .conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()));
        let _ = self.conn.execute_batch("PRAGMA optimize;");
    }

    /// Close the connection, releasing the store file.
    pub fn close(self) {
        // Connection::close returns the connection on failure; there is
        // nothing useful to do with it at this point.
        let _ = self.conn.close();
    }
}

// ---------------------------------------------------------------------------
// Row mapping helpers
// ---------------------------------------------------------------------------

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn parse_date(raw: Option<String>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map_or_else(Utc::now, |dt| dt.with_timezone(&Utc))
}

fn file_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileReference> {
    let original_name: String = row.get(1)?;
    let kind = FileKind::from_name(&original_name);
    Ok(FileReference {
        id: row.get(0)?,
        original_name,
        stored_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        hash: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        added_date: parse_date(row.get::<_, Option<String>>(4)?),
        kind,
    })
}

fn key_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<KeyRecord> {
    let kind_raw: String = row.get(2)?;
    Ok(KeyRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: KeyKind::parse(&kind_raw).unwrap_or(KeyKind::Public),
        material: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        identity: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        added_date: parse_date(row.get::<_, Option<String>>(5)?),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, MetadataStore) {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::create(&dir.path().join("metadata.db"), "pw").unwrap();
        (dir, store)
    }

    #[test]
    fn create_bootstraps_default_group() {
        let (_dir, store) = open_store();
        let groups = store.list_groups().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, DEFAULT_GROUP_ID);
        assert_eq!(groups[0].name, "Default");
    }

    #[test]
    fn reopen_with_wrong_password_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.db");
        let store = MetadataStore::create(&path, "right").unwrap();
        store.close();

        assert!(matches!(
            MetadataStore::open(&path, "wrong"),
            Err(CofferError::DecryptionFailed)
        ));
        assert!(MetadataStore::open(&path, "right").is_ok());
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.db");

        let store = MetadataStore::create(&path, "pw").unwrap();
        store
            .add_password(&NewPasswordEntry {
                label: "Mail".into(),
                secret: "s3cret".into(),
                ..Default::default()
            })
            .unwrap();
        store.close();

        // Re-opening runs bootstrap again; nothing is lost or duplicated.
        let store = MetadataStore::open(&path, "pw").unwrap();
        assert_eq!(store.counts().unwrap().passwords, 1);
        assert_eq!(store.list_groups().unwrap().len(), 1);
    }

    #[test]
    fn password_crud_roundtrip() {
        let (_dir, store) = open_store();

        let id = store
            .add_password(&NewPasswordEntry {
                label: "Mail".into(),
                group: Some("Work".into()),
                address: Some("mail.example.com".into()),
                username: Some("me".into()),
                secret: "s3cret".into(),
            })
            .unwrap();

        let entries = store.list_passwords().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "Mail");
        assert_eq!(entries[0].group_name, "Work");
        assert_eq!(entries[0].username.as_deref(), Some("me"));

        store
            .update_password(
                id,
                &PasswordEntryUpdate {
                    secret: Some("rotated".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(store.list_passwords().unwrap()[0].secret, "rotated");

        store.delete_password(id).unwrap();
        assert!(store.list_passwords().unwrap().is_empty());
    }

    #[test]
    fn update_missing_password_is_not_found() {
        let (_dir, store) = open_store();
        let err = store
            .update_password(
                999,
                &PasswordEntryUpdate {
                    label: Some("x".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, CofferError::RecordNotFound { .. }));
    }

    #[test]
    fn listings_are_newest_first() {
        let (_dir, store) = open_store();
        for label in ["first", "second", "third"] {
            store
                .add_password(&NewPasswordEntry {
                    label: label.into(),
                    secret: "s".into(),
                    ..Default::default()
                })
                .unwrap();
        }

        let labels: Vec<_> = store
            .list_passwords()
            .unwrap()
            .into_iter()
            .map(|p| p.label)
            .collect();
        assert_eq!(labels, vec!["third", "second", "first"]);
    }

    #[test]
    fn group_reference_creates_group() {
        let (_dir, store) = open_store();
        store
            .add_password(&NewPasswordEntry {
                label: "x".into(),
                group: Some("Banking".into()),
                secret: "s".into(),
                ..Default::default()
            })
            .unwrap();

        let names: Vec<_> = store
            .list_groups()
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        // Alphabetical.
        assert_eq!(names, vec!["Banking", "Default"]);
    }

    #[test]
    fn default_group_is_protected() {
        let (_dir, store) = open_store();
        assert!(matches!(
            store.delete_group(DEFAULT_GROUP_ID),
            Err(CofferError::ProtectedRecord)
        ));
    }

    #[test]
    fn deleting_group_reassigns_members_to_default() {
        let (_dir, store) = open_store();
        let group_id = store.ensure_group("Doomed").unwrap();
        for i in 0..3 {
            store
                .add_password(&NewPasswordEntry {
                    label: format!("entry-{i}"),
                    group: Some("Doomed".into()),
                    secret: "s".into(),
                    ..Default::default()
                })
                .unwrap();
        }

        store.delete_group(group_id).unwrap();

        let entries = store.list_passwords().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.group_name == "Default"));
        assert_eq!(store.list_groups().unwrap().len(), 1);
    }

    #[test]
    fn file_and_key_records_roundtrip() {
        let (_dir, store) = open_store();

        let file_id = store
            .add_file("taxes.pdf", "a1b2c3.pdf", "deadbeef")
            .unwrap();
        let file = store.get_file(file_id).unwrap();
        assert_eq!(file.original_name, "taxes.pdf");
        assert_eq!(file.kind, FileKind::Pdf);
        assert_eq!(store.stored_names().unwrap(), vec!["a1b2c3.pdf"]);

        let key_id = store
            .add_key("Backup (Public)", KeyKind::Public, "coffer-pub1:AAAA", "me")
            .unwrap();
        assert_eq!(store.get_key(key_id).unwrap().kind, KeyKind::Public);

        assert_eq!(
            store.counts().unwrap(),
            Counts {
                passwords: 0,
                files: 1,
                keys: 1
            }
        );

        store.delete_file(file_id).unwrap();
        store.delete_key(key_id).unwrap();
        assert_eq!(store.counts().unwrap(), Counts::default());
    }

    #[test]
    fn auth_record_roundtrip() {
        let (_dir, store) = open_store();
        assert!(store.auth_record().unwrap().master_hash.is_none());

        store.set_master_hash("$argon2id$...").unwrap();
        store.set_vault_keys("pub", "wrapped-priv").unwrap();

        let auth = store.auth_record().unwrap();
        assert_eq!(auth.master_hash.as_deref(), Some("$argon2id$..."));
        assert_eq!(auth.vault_public_key.as_deref(), Some("pub"));
        assert_eq!(auth.vault_private_key.as_deref(), Some("wrapped-priv"));
    }
}
