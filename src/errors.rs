use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in Coffer.
///
/// Display strings are written for direct UI display — the operations
/// surface returns them verbatim to its caller.
#[derive(Debug, Error)]
pub enum CofferError {
    // --- Open / unlock errors ---
    #[error("Invalid password{}", .attempts_remaining.map(|n| format!(". {n} attempt(s) remaining")).unwrap_or_default())]
    WrongPassword { attempts_remaining: Option<u32> },

    #[error("Too many failed attempts. Vault locked for {remaining_seconds} seconds")]
    LockedOut { remaining_seconds: u64 },

    #[error("Vault is corrupted: {0}")]
    CorruptVault(String),

    #[error("Vault not found at {0}")]
    VaultNotFound(PathBuf),

    #[error("Vault already exists at {0}")]
    VaultAlreadyExists(PathBuf),

    #[error("Vault creation error: {0}")]
    CreationError(String),

    // --- Session errors ---
    #[error("A vault is already open — close it before opening another")]
    AlreadyOpen,

    #[error("No open vault")]
    NoOpenVault,

    #[error("Vault sealing timed out — shutdown proceeding without a final seal")]
    CloseTimeout,

    // --- Record errors ---
    #[error("Cannot delete the Default group")]
    ProtectedRecord,

    #[error("{kind} record {id} not found")]
    RecordNotFound { kind: &'static str, id: i64 },

    // --- Key errors ---
    #[error("No vault key loaded — file encryption requires an open vault")]
    NoVaultKey,

    #[error("Vault key could not be decrypted — the vault database is damaged")]
    KeyDecryptionError,

    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    // --- Per-file errors ---
    #[error("File '{0}' not found in vault")]
    BlobNotFound(String),

    #[error("Integrity check failed for '{0}' — stored file does not match its recorded hash")]
    IntegrityMismatch(String),

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed — wrong password or corrupted data")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Store errors ---
    #[error("Metadata store error: {0}")]
    Store(#[from] rusqlite::Error),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl CofferError {
    /// True when retrying the same operation with a different password can
    /// succeed. Everything else is fatal for the file or the call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CofferError::WrongPassword { .. } | CofferError::LockedOut { .. }
        )
    }
}

/// Convenience type alias for Coffer results.
pub type Result<T> = std::result::Result<T, CofferError>;
