//! Results of transition and status checks
//!
//! These are values, not errors: a rejected transition is an expected
//! outcome that leaves the entity untouched.

use lifecycle_model::{Phase, PhaseTransition, Status};

/// Why a phase transition is not allowed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// Target equals the current phase
    #[error("entity is already in {0}")]
    SamePhase(Phase),

    /// Target precedes the current phase
    #[error("cannot move back from {from} to {to}")]
    Backward { from: Phase, to: Phase },

    /// Target is more than one phase ahead
    #[error("cannot skip from {from} to {to}; next phase is {next}")]
    Skipped { from: Phase, to: Phase, next: Phase },

    /// Adjacent move whose prerequisites are unmet; one message per gap
    #[error("{}", .0.join("; "))]
    Prerequisites(Vec<String>),

    /// Target name did not parse as a phase
    #[error("unknown phase '{0}'")]
    UnknownPhase(String),
}

/// Full answer to "may this entity move to that phase"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionCheck {
    pub allowed: bool,
    /// Present exactly when `allowed` is false
    pub rejection: Option<Rejection>,
    /// Progress of the current phase, 0..=100
    pub progress: u8,
}

impl TransitionCheck {
    /// Allowed transition
    #[must_use]
    pub fn allow(progress: u8) -> Self {
        Self {
            allowed: true,
            rejection: None,
            progress,
        }
    }

    /// Rejected transition
    #[must_use]
    pub fn reject(rejection: Rejection, progress: u8) -> Self {
        Self {
            allowed: false,
            rejection: Some(rejection),
            progress,
        }
    }

    /// Human-readable reason, if rejected
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.rejection.as_ref().map(ToString::to_string)
    }
}

/// Result of [`crate::PhaseStateMachine::transition`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Entity moved; carries the appended history record
    Applied(PhaseTransition),
    /// Entity unchanged
    Rejected(Rejection),
}

impl TransitionOutcome {
    /// Whether the entity moved
    #[inline]
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// Rejection reason, if any
    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Applied(_) => None,
            Self::Rejected(r) => Some(r),
        }
    }
}

/// Why a status update was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusRejection {
    /// Name is not a known status
    #[error("unknown status '{0}'")]
    Unknown(String),

    /// Status belongs to a different phase
    #[error("status {status} belongs to {owner}, entity is in {current}")]
    WrongPhase {
        status: Status,
        owner: Phase,
        current: Phase,
    },
}
