//! Error types for lifecycle operations
//!
//! Only conditions the caller cannot route around are errors: a missing
//! entity, storage failures, undecodable documents and refused migrations.
//! Illegal transitions and invalid statuses are ordinary return values
//! ([`crate::TransitionOutcome`], [`crate::StatusRejection`]).

use lifecycle_audit::AuditError;
use lifecycle_model::{EntityId, ModelError};
use std::path::PathBuf;

/// Persistence collaborator failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored bytes are not a JSON document
    #[error("stored document {id} is not valid JSON: {source}")]
    Malformed {
        id: EntityId,
        #[source]
        source: serde_json::Error,
    },

    /// Document could not be encoded
    #[error("document encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration loading failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`crate::LifecycleConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main lifecycle error type
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Persistence collaborator has no document for this id
    #[error("entity {0} not found")]
    MissingEntity(EntityId),

    /// Stored document carries a different id than the key it was loaded by
    #[error("document stored under {key} claims id {found}")]
    IdMismatch { key: EntityId, found: String },

    /// Migration stopped early and partial documents are refused
    #[error("migration of {id} stopped at v{reached}: {}", .errors.join("; "))]
    MigrationRefused {
        id: EntityId,
        reached: u32,
        errors: Vec<String>,
    },

    /// Document could not be decoded as an entity
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Persistence failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Audit backend could not be read
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    /// Configuration failure
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
