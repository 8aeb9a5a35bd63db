//! Lifecycle phases and their phase-scoped statuses

use crate::error::ModelError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Top-level lifecycle stage of a workflow entity
///
/// Phases are totally ordered; the only legal edges run from a phase to the
/// one immediately after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Requirements discovery with the client
    Discovery,
    /// Detailed implementation specification
    ImplementationSpec,
    /// Build-out and delivery
    Development,
    /// Engagement closed
    Completed,
}

impl Phase {
    /// Every phase in lifecycle order
    pub const ORDER: [Phase; 4] = [
        Phase::Discovery,
        Phase::ImplementationSpec,
        Phase::Development,
        Phase::Completed,
    ];

    /// Position in [`Phase::ORDER`]
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Phase::Discovery => 0,
            Phase::ImplementationSpec => 1,
            Phase::Development => 2,
            Phase::Completed => 3,
        }
    }

    /// The phase immediately after this one, if any
    #[inline]
    #[must_use]
    pub fn next(self) -> Option<Phase> {
        Self::ORDER.get(self.index() + 1).copied()
    }

    /// Canonical wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Discovery => "discovery",
            Phase::ImplementationSpec => "implementation_spec",
            Phase::Development => "development",
            Phase::Completed => "completed",
        }
    }

    /// Status an entity takes on when it enters this phase
    #[must_use]
    pub const fn default_status(self) -> Status {
        match self {
            Phase::Discovery => Status::DiscoveryInProgress,
            Phase::ImplementationSpec => Status::SpecInProgress,
            Phase::Development => Status::DevNotStarted,
            Phase::Completed => Status::Completed,
        }
    }

    /// Statuses that are valid while in this phase
    #[must_use]
    pub fn statuses(self) -> &'static [Status] {
        use Status::*;
        match self {
            Phase::Discovery => &[
                DiscoveryInProgress,
                DiscoveryComplete,
                AwaitingClientDecision,
                ClientApproved,
            ],
            Phase::ImplementationSpec => &[SpecInProgress, SpecComplete],
            Phase::Development => &[
                DevNotStarted,
                DevInProgress,
                DevTesting,
                DevReadyForDeployment,
                Deployed,
            ],
            Phase::Completed => &[Completed],
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase, trim, and fold `-` and spaces into `_`
fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

impl FromStr for Phase {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        Self::ORDER
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| ModelError::UnknownPhase(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for Phase {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Sub-state within a phase
///
/// Each variant belongs to exactly one phase (see [`Status::phase`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    DiscoveryInProgress,
    DiscoveryComplete,
    AwaitingClientDecision,
    /// Set by the client-approval workflow; gates leaving discovery
    ClientApproved,
    SpecInProgress,
    SpecComplete,
    DevNotStarted,
    DevInProgress,
    DevTesting,
    DevReadyForDeployment,
    Deployed,
    Completed,
}

impl Status {
    /// Every status, grouped by phase in lifecycle order
    pub const ALL: [Status; 12] = [
        Status::DiscoveryInProgress,
        Status::DiscoveryComplete,
        Status::AwaitingClientDecision,
        Status::ClientApproved,
        Status::SpecInProgress,
        Status::SpecComplete,
        Status::DevNotStarted,
        Status::DevInProgress,
        Status::DevTesting,
        Status::DevReadyForDeployment,
        Status::Deployed,
        Status::Completed,
    ];

    /// Phase that owns this status
    #[must_use]
    pub const fn phase(self) -> Phase {
        use Status::*;
        match self {
            DiscoveryInProgress | DiscoveryComplete | AwaitingClientDecision | ClientApproved => {
                Phase::Discovery
            }
            SpecInProgress | SpecComplete => Phase::ImplementationSpec,
            DevNotStarted | DevInProgress | DevTesting | DevReadyForDeployment | Deployed => {
                Phase::Development
            }
            Completed => Phase::Completed,
        }
    }

    /// Canonical wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        use Status::*;
        match self {
            DiscoveryInProgress => "discovery_in_progress",
            DiscoveryComplete => "discovery_complete",
            AwaitingClientDecision => "awaiting_client_decision",
            ClientApproved => "client_approved",
            SpecInProgress => "spec_in_progress",
            SpecComplete => "spec_complete",
            DevNotStarted => "dev_not_started",
            DevInProgress => "dev_in_progress",
            DevTesting => "dev_testing",
            DevReadyForDeployment => "dev_ready_for_deployment",
            Deployed => "deployed",
            Completed => "completed",
        }
    }

    /// Whether this status may be held while in `phase`
    #[inline]
    #[must_use]
    pub fn belongs_to(self, phase: Phase) -> bool {
        self.phase() == phase
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == normalized)
            .ok_or_else(|| ModelError::UnknownStatus(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
