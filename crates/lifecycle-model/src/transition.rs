//! Immutable phase transition records

use crate::phase::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One link in an entity's phase history
///
/// `from_phase` is `None` only for the genesis record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTransition {
    pub from_phase: Option<Phase>,
    pub to_phase: Phase,
    pub timestamp: DateTime<Utc>,
    /// Who or what triggered the change
    #[serde(alias = "transitionedBy")]
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl PhaseTransition {
    /// Record that starts a history chain
    #[must_use]
    pub fn genesis(phase: Phase, actor: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            from_phase: None,
            to_phase: phase,
            timestamp,
            actor: actor.into(),
            notes: None,
        }
    }

    /// Record of a move from `from` to `to`
    #[must_use]
    pub fn new(
        from: Phase,
        to: Phase,
        actor: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            from_phase: Some(from),
            to_phase: to,
            timestamp,
            actor: actor.into(),
            notes: None,
        }
    }

    /// Attach free-text notes
    #[inline]
    #[must_use]
    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Whether this is a chain-starting record
    #[inline]
    #[must_use]
    pub fn is_genesis(&self) -> bool {
        self.from_phase.is_none()
    }
}

/// Why a history sequence breaks the chain invariant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainDefect {
    /// No records at all
    #[error("history is empty")]
    Empty,
    /// First record has a `from_phase`
    #[error("history does not start with a genesis record")]
    MissingGenesis,
    /// A later record has no `from_phase`, or it differs from the previous `to_phase`
    #[error("history link {index} does not continue from the previous phase")]
    BrokenLink { index: usize },
    /// Last `to_phase` is not the entity's current phase
    #[error("history ends in {terminus} but entity is in {current}")]
    TerminusMismatch { terminus: Phase, current: Phase },
}

/// Check `history` against the chain invariants for an entity in `current`
///
/// # Errors
/// Returns the first defect found
pub fn verify_chain(history: &[PhaseTransition], current: Phase) -> Result<(), ChainDefect> {
    let first = history.first().ok_or(ChainDefect::Empty)?;
    if !first.is_genesis() {
        return Err(ChainDefect::MissingGenesis);
    }
    for (index, pair) in history.windows(2).enumerate() {
        if pair[1].from_phase != Some(pair[0].to_phase) {
            return Err(ChainDefect::BrokenLink { index: index + 1 });
        }
    }
    // Non-empty was checked above
    let terminus = history[history.len() - 1].to_phase;
    if terminus != current {
        return Err(ChainDefect::TerminusMismatch { terminus, current });
    }
    Ok(())
}
