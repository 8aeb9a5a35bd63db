//! Error types for the audit trail
//!
//! Corruption is not an error here: a backup that fails its checksum or
//! cannot be parsed is reported as "no usable backup". These variants cover
//! the storage medium itself failing.

use lifecycle_model::ChecksumError;
use std::path::PathBuf;

/// Audit trail failure
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Reading or writing the backing medium failed
    #[error("audit I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record could not be encoded
    #[error("audit record encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// History could not be digested
    #[error("checksum failed: {0}")]
    Checksum(#[from] ChecksumError),

    /// Background writer task did not finish cleanly
    #[error("audit writer stopped abnormally: {0}")]
    Worker(String),
}

impl AuditError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for audit operations
pub type AuditResult<T> = Result<T, AuditError>;
