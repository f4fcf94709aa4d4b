//! Error types for kc_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for kc_core operations.
#[derive(Error, Debug)]
pub enum KcError {
    /// A required field was empty where the record schema demands content.
    #[error("validation failed: {field} must not be empty")]
    EmptyField {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A record id was missing where the operation requires one.
    #[error("validation failed: missing {0}")]
    MissingId(&'static str),

    /// A JSONL line failed to parse as JSON.
    #[error("malformed record at {path} line {line}: {reason}")]
    MalformedRecord {
        /// Path to the file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Parser error description.
        reason: String,
    },

    /// The view snapshot file failed validation or parsing.
    #[error("snapshot invalid at {}: {reason}", path.display())]
    SnapshotInvalid {
        /// Path to the snapshot file.
        path: PathBuf,
        /// Description of why it was rejected.
        reason: String,
    },

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Compaction failed partway through.
    #[error("compaction error: {0}")]
    CompactionError(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KcError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::SnapshotInvalid { .. } => {
                Some("The snapshot will be rebuilt from the JSONL sources on next load.")
            }
            Self::MalformedRecord { .. } => {
                Some("The offending line may need manual repair or removal before the store can be parsed; compaction refuses to run over files with unparseable or unrecognized records.")
            }
            Self::ConfigError(_) => Some("Check config.toml for syntax errors or invalid values."),
            _ => None,
        }
    }
}

/// Convenience Result type for kc_core operations.
pub type Result<T> = std::result::Result<T, KcError>;
