//! Migration step contract

use crate::error::MigrationError;
use serde_json::Value;

/// Output of one step: the upgraded document and what changed
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Document at the step's target version (without the version tag)
    pub document: Value,
    /// Identifiers of the individual changes made; empty when the step was a no-op
    pub changes: Vec<String>,
}

impl StepOutcome {
    /// Outcome with no changes
    #[inline]
    #[must_use]
    pub fn unchanged(document: Value) -> Self {
        Self {
            document,
            changes: Vec::new(),
        }
    }
}

/// A pure function upgrading a document by exactly one schema version
///
/// Implementations must:
/// - never mutate the input (work on a copy),
/// - be idempotent: applying the step to its own output changes nothing,
/// - only add or relocate fields; unknown fields pass through untouched.
///
/// The engine owns the `schemaVersion` tag; steps never write it.
pub trait MigrationStep: Send + Sync + std::fmt::Debug {
    /// Version this step upgrades from
    fn source_version(&self) -> u32;

    /// Version this step produces
    fn target_version(&self) -> u32 {
        self.source_version() + 1
    }

    /// Stable identifier used in results and logs
    fn name(&self) -> &'static str;

    /// Upgrade `document`
    ///
    /// # Errors
    /// Returns error if the document cannot be upgraded
    fn apply(&self, document: &Value) -> Result<StepOutcome, MigrationError>;
}
