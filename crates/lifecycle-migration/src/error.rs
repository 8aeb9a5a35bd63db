//! Error types for schema migration
//!
//! Migration errors are collected into [`crate::MigrationResult::errors`]
//! rather than propagated; these types give each failure a stable message.

/// A single migration failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrationError {
    /// Top-level document is not a JSON object
    #[error("document is not a JSON object")]
    NotAnObject,

    /// Document was written by a newer build
    #[error("document version v{found} is newer than supported v{supported}")]
    NewerThanSupported { found: u32, supported: u32 },

    /// No registered step upgrades from this version
    #[error("no migration step registered for v{0}")]
    MissingStep(u32),

    /// A value along a path has a shape the step cannot work with
    #[error("unexpected shape at '{path}': expected {expected}")]
    UnexpectedShape { path: String, expected: &'static str },

    /// A step rejected the document
    #[error("step '{step}' (v{from} → v{to}) failed: {reason}")]
    StepFailed {
        step: &'static str,
        from: u32,
        to: u32,
        reason: String,
    },
}

impl MigrationError {
    /// Create unexpected shape error for a path
    pub fn unexpected_shape(path: &[&str], expected: &'static str) -> Self {
        Self::UnexpectedShape {
            path: path.join("."),
            expected,
        }
    }
}
