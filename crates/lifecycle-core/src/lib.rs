//! Lifecycle Core
//!
//! Phase state machine and load/save facade for workflow entities.
//!
//! - [`PhaseStateMachine`]: the only code that changes phase, status or history
//! - [`ValidationCache`]: short-TTL memo of transition checks ([`MokaValidationCache`])
//! - [`PayloadValidator`]: injected prerequisite and progress answers ([`JsonPayloadValidator`])
//! - [`DocumentStore`]: raw document persistence ([`MemoryDocumentStore`], [`FileDocumentStore`])
//! - [`Lifecycle`]: migrate on load, repair history from the audit trail, save
//!
//! # Example
//!
//! ```rust
//! use lifecycle_core::{Lifecycle, Rejection};
//! use lifecycle_model::{Phase, Status};
//!
//! let lifecycle = Lifecycle::in_memory();
//! let mut entity = lifecycle.create("consultant").unwrap();
//!
//! // Client approval gates the first move
//! assert!(!lifecycle.can_transition(&entity, Phase::ImplementationSpec));
//! lifecycle.machine().update_status(&mut entity, Status::ClientApproved).unwrap();
//! assert!(lifecycle
//!     .transition(&mut entity, Phase::ImplementationSpec, "consultant", None)
//!     .is_applied());
//!
//! // Skipping ahead is rejected and leaves the entity alone
//! let outcome = lifecycle.transition(&mut entity, Phase::Completed, "consultant", None);
//! assert!(matches!(outcome.rejection(), Some(Rejection::Skipped { .. })));
//! assert_eq!(entity.history.len(), 2);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod cache;
mod check;
mod config;
mod error;
mod machine;
mod service;
mod store;
mod validator;

pub use cache::{MokaValidationCache, NoopValidationCache, ValidationCache, ValidationKey};
pub use check::{Rejection, StatusRejection, TransitionCheck, TransitionOutcome};
pub use config::{CacheConfig, LifecycleConfig, MigrationConfig, StorageConfig};
pub use error::{ConfigError, LifecycleError, LifecycleResult, StoreError, StoreResult};
pub use machine::{allowed_transitions, validate_order, PhaseStateMachine};
pub use service::{
    BatchReport, HistorySource, Lifecycle, LoadedEntity, RECONSTRUCTED_NOTE, SYSTEM_ACTOR,
};
pub use store::{DocumentStore, FileDocumentStore, MemoryDocumentStore};
pub use validator::{
    JsonPayloadValidator, PayloadValidator, PrerequisiteReport, SPEC_SERVICE_SECTIONS,
};
