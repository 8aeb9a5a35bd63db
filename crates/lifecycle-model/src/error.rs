//! Error types for the workflow model

use crate::phase::{Phase, Status};

/// Errors raised while parsing or decoding workflow documents
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Phase name not in the lifecycle enumeration
    #[error("unknown phase: '{0}'")]
    UnknownPhase(String),

    /// Status name not in any phase's enumeration
    #[error("unknown status: '{0}'")]
    UnknownStatus(String),

    /// Status exists but belongs to another phase
    #[error("status {status} is not valid in phase {phase}")]
    StatusPhaseMismatch { status: Status, phase: Phase },

    /// Entity id is not a valid ULID
    #[error("invalid entity id '{id}': {reason}")]
    InvalidEntityId { id: String, reason: String },

    /// Document does not have the current entity shape
    #[error("malformed document: {0}")]
    MalformedDocument(#[from] serde_json::Error),
}

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;
