//! Lockout tracker — failed-unlock accounting outside the container.
//!
//! State lives in a small JSON file keyed by vault path, deliberately
//! *outside* the encrypted container: an attacker guessing passwords
//! online would otherwise face no tracked attempt count at all, since
//! the container cannot be read without the password being guessed.
//! (Offline guessing is Argon2's problem, not this tracker's.)
//!
//! The file persists across process restarts; a missing or unreadable
//! file degrades to zero recorded attempts.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::errors::Result;

/// Result of a pre-verification lockout check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutStatus {
    pub locked: bool,
    pub remaining_seconds: u64,
}

/// Result of recording a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub locked: bool,
    pub remaining_seconds: u64,
    pub attempts_remaining: u32,
}

/// Per-vault-path persisted record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LockoutEntry {
    failed_attempts: u32,
    locked_until: Option<DateTime<Utc>>,
}

/// On-disk shape of the state file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LockoutState {
    entries: HashMap<String, LockoutEntry>,
}

/// Tracks consecutive failed unlock attempts per vault path.
pub struct LockoutTracker {
    file: PathBuf,
    max_attempts: u32,
    lockout_secs: u64,
}

impl LockoutTracker {
    pub fn new(file: PathBuf, max_attempts: u32, lockout_secs: u64) -> Self {
        Self {
            file,
            max_attempts,
            lockout_secs,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.lockout_file.clone(),
            settings.max_attempts,
            settings.lockout_secs,
        )
    }

    /// Called before password verification.
    pub fn check(&self, vault_path: &Path) -> Result<LockoutStatus> {
        let mut state = self.load_state();
        let entry = normalized_entry(&mut state, &key_for(vault_path));

        match remaining(entry) {
            Some(secs) => Ok(LockoutStatus {
                locked: true,
                remaining_seconds: secs,
            }),
            None => Ok(LockoutStatus {
                locked: false,
                remaining_seconds: 0,
            }),
        }
    }

    /// Called after a password-verification failure.
    ///
    /// Reaching the configured maximum starts the lockout window.
    pub fn record_failure(&self, vault_path: &Path) -> Result<FailureOutcome> {
        let mut state = self.load_state();
        let key = key_for(vault_path);
        let entry = normalized_entry(&mut state, &key);

        entry.failed_attempts += 1;
        if entry.failed_attempts >= self.max_attempts {
            entry.locked_until =
                Some(Utc::now() + chrono::Duration::seconds(self.lockout_secs as i64));
        }

        let outcome = FailureOutcome {
            locked: entry.locked_until.is_some(),
            remaining_seconds: remaining(entry).unwrap_or(0),
            attempts_remaining: self.max_attempts.saturating_sub(entry.failed_attempts),
        };

        self.save_state(&state)?;
        Ok(outcome)
    }

    /// Called after a successful unlock: the counter goes back to zero.
    pub fn reset(&self, vault_path: &Path) -> Result<()> {
        let mut state = self.load_state();
        if state.entries.remove(&key_for(vault_path)).is_some() {
            self.save_state(&state)?;
        }
        Ok(())
    }

    fn load_state(&self) -> LockoutState {
        // Unreadable state degrades to "no recorded attempts" — this is a
        // rate limiter, not a cryptographic control.
        fs::read(&self.file)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }

    fn save_state(&self, state: &LockoutState) -> Result<()> {
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| crate::errors::CofferError::SerializationError(e.to_string()))?;

        // Atomic rewrite, same pattern as the container file.
        let tmp = self.file.with_extension("json.tmp");
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, &self.file)?;
        Ok(())
    }
}

/// Stable key for a vault path; canonicalization keeps `./work.vault`
/// and its absolute form on one counter.
fn key_for(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

/// Fetch the entry for `key`, clearing an expired lockout window so the
/// caller always sees a live state.
fn normalized_entry<'a>(state: &'a mut LockoutState, key: &str) -> &'a mut LockoutEntry {
    let entry = state.entries.entry(key.to_string()).or_default();
    if let Some(until) = entry.locked_until {
        if until <= Utc::now() {
            // Window elapsed: fresh attempt budget.
            *entry = LockoutEntry::default();
        }
    }
    entry
}

fn remaining(entry: &LockoutEntry) -> Option<u64> {
    entry.locked_until.and_then(|until| {
        let secs = (until - Utc::now()).num_seconds();
        (secs > 0).then_some(secs as u64)
    })
}
