//! Migration engine: runs registered steps from a document's version up to the target
//!
//! The engine never propagates step failures. Every run produces a
//! [`MigrationResult`] carrying the furthest document it could reach plus the
//! errors that stopped it; callers decide whether a partial result is usable.

use crate::error::MigrationError;
use crate::log::{MigrationLog, MigrationLogEntry};
use crate::path;
use crate::step::MigrationStep;
use crate::steps::{builtin_steps, RELOCATIONS, WRAPPED_LISTS};
use chrono::Utc;
use lifecycle_model::CURRENT_SCHEMA_VERSION;
use serde_json::Value;

/// Field holding the schema version
pub const VERSION_FIELD: &str = "schemaVersion";

/// Field used for the version by documents written before the rename
pub const LEGACY_VERSION_FIELD: &str = "dataVersion";

/// Outcome of one [`MigrationEngine::migrate`] call
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationResult {
    /// Furthest document reached; a deep copy, never the caller's value
    pub document: Value,
    /// Whether `document` differs from the input
    pub migrated: bool,
    /// Names of the steps that succeeded, in order
    pub steps_applied: Vec<String>,
    /// `<step>/<change>` identifiers reported by the applied steps
    pub changes: Vec<String>,
    /// Failure messages; empty on a complete migration
    pub errors: Vec<String>,
    pub original_version: u32,
    pub new_version: u32,
}

impl MigrationResult {
    /// True when no error stopped the chain
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    fn untouched(document: Value, version: u32) -> Self {
        Self {
            document,
            migrated: false,
            steps_applied: Vec::new(),
            changes: Vec::new(),
            errors: Vec::new(),
            original_version: version,
            new_version: version,
        }
    }
}

/// Read the document's schema version
///
/// `schemaVersion` wins over the legacy `dataVersion`; documents carrying
/// neither (or a non-positive value) are version 1.
#[must_use]
pub fn document_version(document: &Value) -> u32 {
    [VERSION_FIELD, LEGACY_VERSION_FIELD]
        .iter()
        .find_map(|field| document.get(*field).and_then(Value::as_u64))
        .and_then(|v| u32::try_from(v).ok())
        .map_or(1, |v| v.max(1))
}

/// Write the version tag, retiring the legacy field
fn stamp(document: &mut Value, version: u32) {
    if let Some(root) = document.as_object_mut() {
        root.remove(LEGACY_VERSION_FIELD);
        root.insert(VERSION_FIELD.to_string(), Value::from(version));
    }
}

/// Step-wise schema migration engine
#[derive(Debug)]
pub struct MigrationEngine {
    steps: Vec<Box<dyn MigrationStep>>,
    target: u32,
    log: MigrationLog,
}

impl MigrationEngine {
    /// Engine with the built-in steps targeting [`CURRENT_SCHEMA_VERSION`]
    #[must_use]
    pub fn new() -> Self {
        Self::with_steps(builtin_steps(), CURRENT_SCHEMA_VERSION)
    }

    /// Engine with a custom step list
    #[must_use]
    pub fn with_steps(mut steps: Vec<Box<dyn MigrationStep>>, target: u32) -> Self {
        steps.sort_by_key(|s| s.source_version());
        Self {
            steps,
            target,
            log: MigrationLog::default(),
        }
    }

    /// Replace the migration log with one of `capacity` entries
    #[must_use]
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log = MigrationLog::new(capacity);
        self
    }

    /// Version documents are migrated to
    #[inline]
    #[must_use]
    pub fn current_version(&self) -> u32 {
        self.target
    }

    /// Whether `document` is older than the target version
    #[must_use]
    pub fn needs_migration(&self, document: &Value) -> bool {
        document_version(document) < self.target
    }

    fn step_for(&self, version: u32) -> Option<&dyn MigrationStep> {
        self.steps
            .iter()
            .find(|s| s.source_version() == version)
            .map(AsRef::as_ref)
    }

    /// Migrate `document` to the target version
    ///
    /// Steps run in ascending order on a deep copy. The version tag is written
    /// after each successful step, so a failure at step N leaves the result at
    /// the version step N started from.
    #[tracing::instrument(skip_all, fields(entity_id = entity_label(document)))]
    pub fn migrate(&self, document: &Value) -> MigrationResult {
        let original = document_version(document);
        let mut result = MigrationResult::untouched(document.clone(), original);

        if !document.is_object() {
            result.errors.push(MigrationError::NotAnObject.to_string());
            tracing::warn!("Refusing to migrate non-object document");
            return result;
        }

        if original > self.target {
            let err = MigrationError::NewerThanSupported {
                found: original,
                supported: self.target,
            };
            tracing::warn!(error = %err, "Leaving document unmodified");
            result.errors.push(err.to_string());
            self.record(document, &result);
            return result;
        }

        let mut version = original;
        while version < self.target {
            let Some(step) = self.step_for(version) else {
                result.errors.push(MigrationError::MissingStep(version).to_string());
                break;
            };
            match step.apply(&result.document) {
                Ok(outcome) => {
                    version = step.target_version();
                    result.document = outcome.document;
                    stamp(&mut result.document, version);
                    result.steps_applied.push(step.name().to_string());
                    result
                        .changes
                        .extend(outcome.changes.into_iter().map(|c| format!("{}/{c}", step.name())));
                    tracing::debug!(step = step.name(), version, "Migration step applied");
                }
                Err(err) => {
                    tracing::warn!(step = step.name(), error = %err, "Migration step failed");
                    result.errors.push(err.to_string());
                    break;
                }
            }
        }

        // Current documents still tagged with the legacy field only need the rename
        if result.steps_applied.is_empty()
            && document.get(VERSION_FIELD).is_none()
            && document.get(LEGACY_VERSION_FIELD).is_some()
            && result.errors.is_empty()
        {
            stamp(&mut result.document, version);
        }

        result.new_version = version;
        result.migrated = result.document != *document;

        if result.migrated {
            tracing::info!(
                from = original,
                to = version,
                steps = ?result.steps_applied,
                "Document migrated"
            );
        }
        if result.migrated || !result.errors.is_empty() {
            self.record(document, &result);
        }
        result
    }

    fn record(&self, document: &Value, result: &MigrationResult) {
        self.log.record(MigrationLogEntry {
            timestamp: Utc::now(),
            entity_id: document.get("id").and_then(Value::as_str).map(str::to_string),
            from_version: result.original_version,
            to_version: result.new_version,
            steps_applied: result.steps_applied.clone(),
            errors: result.errors.clone(),
        });
    }

    /// One-line description of the document's migration state
    #[must_use]
    pub fn summary(&self, document: &Value) -> String {
        let version = document_version(document);
        match version.cmp(&self.target) {
            std::cmp::Ordering::Equal => format!("up to date (v{version})"),
            std::cmp::Ordering::Less => {
                format!("migration needed: v{version} → v{}", self.target)
            }
            std::cmp::Ordering::Greater => format!(
                "version v{version} is newer than supported v{}",
                self.target
            ),
        }
    }

    /// Structural issues left in a supposedly migrated document
    ///
    /// An empty list means the document has the current shape.
    #[must_use]
    pub fn validate_migration(&self, document: &Value) -> Vec<String> {
        let mut issues = Vec::new();
        if !document.is_object() {
            issues.push(MigrationError::NotAnObject.to_string());
            return issues;
        }

        let version = document_version(document);
        if version < self.target {
            issues.push(format!("schema version v{version} is older than v{}", self.target));
        }

        for list in &WRAPPED_LISTS {
            let field = ["payload", "modules", list.section, list.field];
            if let Some(value) = path::get(document, &field) {
                if !value.is_array() {
                    issues.push(format!("{}.{} is not a list", list.section, list.field));
                }
            }
        }

        for relocation in RELOCATIONS {
            if path::get(document, relocation.from).is_some() {
                issues.push(format!(
                    "{} was not relocated to {}",
                    relocation.from.join("."),
                    relocation.to.join(".")
                ));
            }
        }

        if self.target >= CURRENT_SCHEMA_VERSION {
            for field in ["phase", "status", "history"] {
                if document.get(field).is_none() {
                    issues.push(format!("missing '{field}'"));
                }
            }
        }
        issues
    }

    /// Migration log
    #[inline]
    #[must_use]
    pub fn log(&self) -> &MigrationLog {
        &self.log
    }

    /// Snapshot of the migration log, oldest first
    #[must_use]
    pub fn logs(&self) -> Vec<MigrationLogEntry> {
        self.log.entries()
    }

    /// Empty the migration log
    pub fn clear_logs(&self) {
        self.log.clear();
    }

    /// Human-readable report of the last `limit` migrations
    #[must_use]
    pub fn report(&self, limit: usize) -> String {
        self.log.report(self.target, limit)
    }
}

impl Default for MigrationEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn entity_label(document: &Value) -> &str {
    document.get("id").and_then(Value::as_str).unwrap_or("")
}
