//! Lifecycle Migration
//!
//! Upgrades persisted workflow documents from any historical schema version
//! to [`lifecycle_model::CURRENT_SCHEMA_VERSION`], one pure step at a time.
//!
//! | Step | Versions | Change |
//! |---|---|---|
//! | [`PromoteWrappedLists`] | v1 → v2 | `{sources: [...]}` style wrappers become bare lists |
//! | [`RelocateFields`] | v2 → v3 | fields that changed owning section move (see [`RELOCATIONS`]) |
//! | [`IntroducePhaseTracking`] | v3 → v4 | `phase`, `status` and `history` are added |
//!
//! # Example
//!
//! ```rust
//! use lifecycle_migration::MigrationEngine;
//! use serde_json::json;
//!
//! let engine = MigrationEngine::new();
//! let legacy = json!({"payload": {"modules": {
//!     "leadsAndSales": {"leadSources": {"sources": [{"channel": "web"}]}}
//! }}});
//!
//! let result = engine.migrate(&legacy);
//! assert!(result.migrated);
//! assert_eq!(result.new_version, 4);
//! assert_eq!(
//!     result.document["payload"]["modules"]["leadsAndSales"]["leadSources"],
//!     json!([{"channel": "web"}])
//! );
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod engine;
mod error;
mod log;
mod path;
mod step;
mod steps;

pub use engine::{
    document_version, MigrationEngine, MigrationResult, LEGACY_VERSION_FIELD, VERSION_FIELD,
};
pub use error::MigrationError;
pub use log::{MigrationLog, MigrationLogEntry, DEFAULT_LOG_CAPACITY};
pub use step::{MigrationStep, StepOutcome};
pub use steps::{
    builtin_steps, IntroducePhaseTracking, PromoteWrappedLists, RelocateFields, Relocation,
    WrappedList, RELOCATIONS, WRAPPED_LISTS,
};
