//! Record types held by the metadata store.
//!
//! Timestamps are RFC 3339 text in the store and `DateTime<Utc>` here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordEntry {
    pub id: i64,
    pub label: String,
    /// Resolved group name ("Default" when the group reference is gone).
    pub group_name: String,
    pub address: Option<String>,
    pub username: Option<String>,
    pub secret: String,
    pub added_date: DateTime<Utc>,
}

/// Fields for creating a password entry.
///
/// `group` is a name, not an id — referencing a group that does not
/// exist yet creates it.
#[derive(Debug, Clone, Default)]
pub struct NewPasswordEntry {
    pub label: String,
    pub group: Option<String>,
    pub address: Option<String>,
    pub username: Option<String>,
    pub secret: String,
}

/// Partial update of a password entry; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct PasswordEntryUpdate {
    pub label: Option<String>,
    pub group: Option<String>,
    pub address: Option<String>,
    pub username: Option<String>,
    pub secret: Option<String>,
}

/// A reference to an encrypted file blob.
///
/// The blob itself lives under the staging area's `files/` directory
/// while the vault is open, named by `stored_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReference {
    pub id: i64,
    /// The user-visible name the file had when it was staged.
    pub original_name: String,
    /// Random on-disk name; leaks nothing of the original beyond the
    /// extension.
    pub stored_name: String,
    /// SHA-256 hex of the plaintext, for integrity verification.
    pub hash: String,
    pub added_date: DateTime<Utc>,
    /// Coarse classification derived from the original name's extension.
    pub kind: FileKind,
}

/// Display classification of a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Image,
    Video,
    Audio,
    Archive,
    Text,
    Pdf,
    Document,
    Spreadsheet,
    Presentation,
    Code,
    Data,
    Other,
}

impl FileKind {
    /// Classify by extension of the original file name.
    pub fn from_name(name: &str) -> Self {
        let ext = name
            .rsplit_once('.')
            .map(|(_, e)| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "tif" | "tiff" | "svg" | "heic"
            | "heif" | "ico" => Self::Image,
            "mp4" | "m4v" | "mkv" | "mov" | "avi" | "wmv" | "flv" | "webm" | "mpeg" | "mpg"
            | "3gp" => Self::Video,
            "mp3" | "wav" | "flac" | "aac" | "ogg" | "m4a" | "wma" | "opus" => Self::Audio,
            "zip" | "rar" | "7z" | "tar" | "gz" | "bz2" | "xz" | "tgz" | "iso" | "dmg" => {
                Self::Archive
            }
            "txt" | "md" | "log" => Self::Text,
            "pdf" => Self::Pdf,
            "doc" | "docx" | "odt" | "rtf" => Self::Document,
            "xls" | "xlsx" | "ods" | "csv" | "tsv" => Self::Spreadsheet,
            "ppt" | "pptx" | "odp" => Self::Presentation,
            "js" | "ts" | "jsx" | "tsx" | "java" | "c" | "cpp" | "cs" | "go" | "rs" | "py"
            | "php" | "rb" | "swift" | "kt" | "sql" | "html" | "css" | "json" | "yml" | "yaml"
            | "xml" | "ini" | "cfg" | "env" | "toml" => Self::Code,
            "db" | "sqlite" | "sqlite3" | "bak" | "bin" | "dat" => Self::Data,
            _ => Self::Other,
        }
    }
}

/// Which half of a keypair a key record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Public,
    Private,
}

impl KeyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// A user-facing key record — an imported or generated key, independent
/// of the vault's internal keypair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRecord {
    pub id: i64,
    pub name: String,
    pub kind: KeyKind,
    /// Armored key text.
    pub material: String,
    /// Identity string the key was generated for (may be empty for
    /// imported keys).
    pub identity: String,
    pub added_date: DateTime<Utc>,
}

/// An organizational group for password entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub added_date: DateTime<Utc>,
}

/// Aggregate record counts, as shown on a dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub passwords: u64,
    pub files: u64,
    pub keys: u64,
}
