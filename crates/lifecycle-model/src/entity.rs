//! The workflow entity aggregate

use crate::error::{ModelError, ModelResult};
use crate::phase::{Phase, Status};
use crate::transition::{verify_chain, ChainDefect, PhaseTransition};
use crate::CURRENT_SCHEMA_VERSION;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use ulid::Ulid;

/// Stable entity identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub Ulid);

impl EntityId {
    /// Generate new entity ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s.trim())
            .map(Self)
            .map_err(|e| ModelError::InvalidEntityId {
                id: s.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Root aggregate tracked through the lifecycle phases
///
/// `phase`, `status` and `history` are only changed by the phase state
/// machine; `payload` is business data owned by collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEntity {
    pub id: EntityId,
    pub schema_version: u32,
    pub phase: Phase,
    pub status: Status,
    #[serde(default)]
    pub history: Vec<PhaseTransition>,
    #[serde(default = "empty_payload")]
    pub payload: Value,
}

fn empty_payload() -> Value {
    Value::Object(serde_json::Map::new())
}

impl WorkflowEntity {
    /// Create an entity in discovery with its genesis transition
    #[must_use]
    pub fn new(actor: impl Into<String>) -> Self {
        Self::with_payload(actor, empty_payload())
    }

    /// Create an entity in discovery carrying `payload`
    #[must_use]
    pub fn with_payload(actor: impl Into<String>, payload: Value) -> Self {
        let phase = Phase::Discovery;
        Self {
            id: EntityId::new(),
            schema_version: CURRENT_SCHEMA_VERSION,
            phase,
            status: phase.default_status(),
            history: vec![PhaseTransition::genesis(phase, actor, Utc::now())],
            payload,
        }
    }

    /// Decode a current-version document
    ///
    /// A status that belongs to another phase is replaced by the phase
    /// default so the entity never holds a foreign status.
    ///
    /// # Errors
    /// Returns [`ModelError::MalformedDocument`] if required fields are
    /// missing or have the wrong type
    pub fn from_document(document: Value) -> ModelResult<Self> {
        let mut entity: Self = serde_json::from_value(document)?;
        if !entity.status.belongs_to(entity.phase) {
            tracing::warn!(
                entity = %entity.id,
                status = %entity.status,
                phase = %entity.phase,
                "stored status belongs to another phase, resetting to phase default"
            );
            entity.status = entity.phase.default_status();
        }
        Ok(entity)
    }

    /// Encode as a persistence document
    ///
    /// # Errors
    /// Returns error if the payload cannot be serialized
    pub fn to_document(&self) -> ModelResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Last record in the history chain
    #[inline]
    #[must_use]
    pub fn latest_transition(&self) -> Option<&PhaseTransition> {
        self.history.last()
    }

    /// Check the history chain invariants against the current phase
    ///
    /// # Errors
    /// Returns the first chain defect found
    pub fn verify_history(&self) -> Result<(), ChainDefect> {
        verify_chain(&self.history, self.phase)
    }

    /// Whether the history chain satisfies every invariant
    #[inline]
    #[must_use]
    pub fn history_is_consistent(&self) -> bool {
        self.verify_history().is_ok()
    }
}
