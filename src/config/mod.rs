//! Runtime configuration for Coffer.
//!
//! Every knob the container protocol and lockout tracker need lives in
//! `Settings`, loaded from a `coffer.toml` file with per-field defaults so
//! the crate works out-of-the-box without any config file at all.
//!
//! The staging root is deliberately injectable (rather than hard-coded to
//! the OS temp path) so embedders and parallel tests can isolate their
//! staging areas.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{CofferError, Result};

/// Crate-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root directory under which per-session staging areas are created.
    #[serde(default = "default_staging_root")]
    pub staging_root: PathBuf,

    /// Path of the lockout state file. Lives outside any vault container
    /// so it survives even when a container cannot be decrypted.
    #[serde(default = "default_lockout_file")]
    pub lockout_file: PathBuf,

    /// Consecutive failed unlock attempts allowed before a lockout window
    /// starts.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Length of the lockout window in seconds.
    #[serde(default = "default_lockout_secs")]
    pub lockout_secs: u64,

    /// Argon2 memory cost in KiB (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    /// Hard limit in seconds for close/seal during shutdown. When it
    /// elapses, shutdown proceeds and the failure is reported instead of
    /// blocking process exit.
    #[serde(default = "default_close_timeout_secs")]
    pub close_timeout_secs: u64,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_staging_root() -> PathBuf {
    std::env::temp_dir().join("coffer")
}

fn default_lockout_file() -> PathBuf {
    default_staging_root().join("lockout.json")
}

fn default_max_attempts() -> u32 {
    5
}

fn default_lockout_secs() -> u64 {
    300
}

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

fn default_close_timeout_secs() -> u64 {
    10
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            staging_root: default_staging_root(),
            lockout_file: default_lockout_file(),
            max_attempts: default_max_attempts(),
            lockout_secs: default_lockout_secs(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
            close_timeout_secs: default_close_timeout_secs(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the given directory.
    const FILE_NAME: &'static str = "coffer.toml";

    /// Load settings from `<config_dir>/coffer.toml`.
    ///
    /// If the file does not exist, defaults are returned. If the file
    /// exists but cannot be parsed, an error is returned.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            CofferError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn argon2_params(&self) -> crate::crypto::kdf::Argon2Params {
        crate::crypto::kdf::Argon2Params {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }

    /// The close/seal deadline as a `Duration`.
    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.max_attempts, 5);
        assert_eq!(s.lockout_secs, 300);
        assert_eq!(s.argon2_memory_kib, 65_536);
        assert_eq!(s.argon2_iterations, 3);
        assert_eq!(s.argon2_parallelism, 4);
        assert_eq!(s.close_timeout_secs, 10);
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.max_attempts, 5);
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
staging_root = "/var/tmp/coffer-staging"
max_attempts = 3
lockout_secs = 60
argon2_memory_kib = 131072
close_timeout_secs = 5
"#;
        fs::write(tmp.path().join("coffer.toml"), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.staging_root, PathBuf::from("/var/tmp/coffer-staging"));
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.lockout_secs, 60);
        assert_eq!(settings.argon2_memory_kib, 131_072);
        assert_eq!(settings.close_timeout_secs, 5);
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("coffer.toml"), "max_attempts = 8\n").unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.max_attempts, 8);
        // Rest should be defaults
        assert_eq!(settings.lockout_secs, 300);
        assert_eq!(settings.argon2_iterations, 3);
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("coffer.toml"), "not valid {{toml").unwrap();

        let result = Settings::load(tmp.path());
        assert!(result.is_err());
    }
}
