//! Lifecycle Audit
//!
//! Independent, checksummed backups of an entity's phase history, used to
//! recover the history when the primary document loses or truncates it.
//!
//! - [`AuditTrail`]: `backup` / `restore` with Blake3 corruption detection
//! - [`AuditBackend`]: keyed blob storage ([`MemoryAuditBackend`], [`FileAuditBackend`])
//! - [`AuditSink`]: what the state machine calls after each transition;
//!   [`BackgroundAuditWriter`] moves the write off the caller's path
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use lifecycle_audit::AuditTrail;
//! use lifecycle_model::{EntityId, Phase, PhaseTransition};
//!
//! let trail = AuditTrail::in_memory();
//! let id = EntityId::new();
//! let history = vec![PhaseTransition::genesis(Phase::Discovery, "system", Utc::now())];
//!
//! trail.backup(id, &history).unwrap();
//! assert_eq!(trail.restore(id).unwrap(), Some(history));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod backend;
mod error;
mod sink;
mod trail;

pub use backend::{AuditBackend, FileAuditBackend, MemoryAuditBackend};
pub use error::{AuditError, AuditResult};
pub use sink::{AuditSink, BackgroundAuditWriter, NullAuditSink, WriterStats};
pub use trail::{AuditRecord, AuditTrail, BackupState};
