//! Payload-specific prerequisite checks
//!
//! The state machine never reads business data itself. It asks a
//! [`PayloadValidator`] whether the payload satisfies the prerequisites of a
//! move and how far along the current phase is.

use lifecycle_model::{Phase, Status, WorkflowEntity};
use serde_json::Value;
use std::collections::HashSet;

/// Unmet prerequisites for one transition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrerequisiteReport {
    /// One user-facing message per unmet requirement
    pub missing: Vec<String>,
}

impl PrerequisiteReport {
    /// Report with nothing missing
    #[inline]
    #[must_use]
    pub fn satisfied() -> Self {
        Self::default()
    }

    /// Report listing `missing`
    #[must_use]
    pub fn missing<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether every prerequisite is met
    #[inline]
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Injected capability answering payload questions for the state machine
#[cfg_attr(test, mockall::automock)]
pub trait PayloadValidator: Send + Sync {
    /// Prerequisites for moving `entity` from its current phase to `target`
    ///
    /// Only called for adjacent forward moves that the machine cannot decide
    /// from phase and status alone.
    fn prerequisites(&self, entity: &WorkflowEntity, target: Phase) -> PrerequisiteReport;

    /// Progress of `phase` for `entity`, 0..=100, when `phase` is current
    fn progress(&self, entity: &WorkflowEntity, phase: Phase) -> u8;
}

/// Spec sections whose entries carry a `serviceId`
pub const SPEC_SERVICE_SECTIONS: [&str; 5] = [
    "automations",
    "aiAgentServices",
    "integrationServices",
    "systemImplementations",
    "additionalServices",
];

/// Validator reading the standard payload layout
///
/// | Field | Used for |
/// |---|---|
/// | `implementationSpec.completionPercentage` | spec → development, spec progress |
/// | `modules.proposal.purchasedServices[].id` | services needing a spec entry |
/// | `implementationSpec.<section>[].serviceId` | services that have one |
/// | `developmentTracking.tasks[].status` | development → completed, development progress |
/// | `developmentTracking.blockers[].status` | development → completed |
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPayloadValidator;

impl JsonPayloadValidator {
    fn spec_to_development(payload: &Value) -> PrerequisiteReport {
        let mut missing = Vec::new();
        let spec = payload.get("implementationSpec");

        let completion = spec_completion(payload);
        if completion < 100 {
            missing.push(format!(
                "implementation spec is {completion}% complete (100% required)"
            ));
        }

        let purchased = payload
            .pointer("/modules/proposal/purchasedServices")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if purchased.is_empty() {
            missing.push("no purchased services".to_string());
        }

        let specified: HashSet<&str> = SPEC_SERVICE_SECTIONS
            .iter()
            .filter_map(|section| spec.and_then(|s| s.get(*section)).and_then(Value::as_array))
            .flatten()
            .filter_map(|entry| entry.get("serviceId").and_then(Value::as_str))
            .collect();
        for service in purchased {
            let id = service.get("id").and_then(Value::as_str);
            if id.is_some_and(|id| specified.contains(id)) {
                continue;
            }
            let label = ["name", "nameHe", "id"]
                .iter()
                .find_map(|k| service.get(*k).and_then(Value::as_str))
                .unwrap_or("<unnamed>");
            missing.push(format!("service '{label}' has no implementation spec"));
        }

        PrerequisiteReport { missing }
    }

    fn development_to_completed(payload: &Value) -> PrerequisiteReport {
        let mut missing = Vec::new();
        let tasks = items(payload, "/developmentTracking/tasks");
        if tasks.is_empty() {
            missing.push("no development tasks".to_string());
        } else {
            let open = tasks.iter().filter(|t| !has_status(t, "done")).count();
            if open > 0 {
                missing.push(plural(open, "task", "incomplete"));
            }
        }

        let blocked = items(payload, "/developmentTracking/blockers")
            .iter()
            .filter(|b| !has_status(b, "resolved"))
            .count();
        if blocked > 0 {
            missing.push(plural(blocked, "blocker", "unresolved"));
        }

        PrerequisiteReport { missing }
    }
}

impl PayloadValidator for JsonPayloadValidator {
    fn prerequisites(&self, entity: &WorkflowEntity, target: Phase) -> PrerequisiteReport {
        match (entity.phase, target) {
            (Phase::ImplementationSpec, Phase::Development) => {
                Self::spec_to_development(&entity.payload)
            }
            (Phase::Development, Phase::Completed) => {
                Self::development_to_completed(&entity.payload)
            }
            _ => PrerequisiteReport::satisfied(),
        }
    }

    fn progress(&self, entity: &WorkflowEntity, phase: Phase) -> u8 {
        match phase {
            Phase::Discovery => match entity.status {
                Status::DiscoveryInProgress => 25,
                Status::DiscoveryComplete => 50,
                Status::AwaitingClientDecision => 75,
                _ => 100,
            },
            Phase::ImplementationSpec => spec_completion(&entity.payload),
            Phase::Development => {
                let tasks = items(&entity.payload, "/developmentTracking/tasks");
                if tasks.is_empty() {
                    return 0;
                }
                let done = tasks.iter().filter(|t| has_status(t, "done")).count();
                percent(done, tasks.len())
            }
            Phase::Completed => 100,
        }
    }
}

/// `implementationSpec.completionPercentage`, clamped to 0..=100
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn spec_completion(payload: &Value) -> u8 {
    payload
        .pointer("/implementationSpec/completionPercentage")
        .and_then(Value::as_f64)
        .map_or(0, |p| p.round().clamp(0.0, 100.0) as u8)
}

fn items<'a>(payload: &'a Value, pointer: &str) -> &'a [Value] {
    payload
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn has_status(item: &Value, status: &str) -> bool {
    item.get("status").and_then(Value::as_str) == Some(status)
}

fn plural(n: usize, noun: &str, state: &str) -> String {
    if n == 1 {
        format!("1 {noun} {state}")
    } else {
        format!("{n} {noun}s {state}")
    }
}

fn percent(part: usize, whole: usize) -> u8 {
    let pct = (part * 100 + whole / 2) / whole;
    u8::try_from(pct.min(100)).unwrap_or(100)
}
