//! Lifecycle Model
//!
//! Core types for an engagement record moving through its lifecycle.
//!
//! # Core Concepts
//!
//! - [`WorkflowEntity`]: the root aggregate (id, schema version, phase, status, history, payload)
//! - [`Phase`]: ordered lifecycle stage (`discovery → implementation_spec → development → completed`)
//! - [`Status`]: phase-scoped sub-state
//! - [`PhaseTransition`]: immutable history record
//! - [`Checksum`]: Blake3 digest for corruption detection
//!
//! # Example
//!
//! ```rust
//! use lifecycle_model::{Phase, WorkflowEntity};
//!
//! let entity = WorkflowEntity::new("consultant");
//! assert_eq!(entity.phase, Phase::Discovery);
//! assert!(entity.history_is_consistent());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod checksum;
mod entity;
mod error;
mod phase;
mod transition;

pub use checksum::{Checksum, ChecksumError};
pub use entity::{EntityId, WorkflowEntity};
pub use error::{ModelError, ModelResult};
pub use phase::{Phase, Status};
pub use transition::{verify_chain, ChainDefect, PhaseTransition};

/// Schema version written by this build
pub const CURRENT_SCHEMA_VERSION: u32 = 4;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
