//! v3 → v4: introduce the lifecycle tracking fields
//!
//! Documents written before phase tracking carry no `phase`/`status`, and
//! some carry their history under the legacy `phaseHistory` key.

use crate::error::MigrationError;
use crate::step::{MigrationStep, StepOutcome};
use lifecycle_model::{Phase, Status};
use serde_json::Value;

/// Adds `phase`, `status` and `history` where they are missing
#[derive(Debug, Clone, Copy, Default)]
pub struct IntroducePhaseTracking;

impl IntroducePhaseTracking {
    fn fail(&self, reason: String) -> MigrationError {
        MigrationError::StepFailed {
            step: self.name(),
            from: self.source_version(),
            to: self.target_version(),
            reason,
        }
    }
}

impl MigrationStep for IntroducePhaseTracking {
    fn source_version(&self) -> u32 {
        3
    }

    fn name(&self) -> &'static str {
        "introduce_phase_tracking"
    }

    fn apply(&self, document: &Value) -> Result<StepOutcome, MigrationError> {
        let mut doc = document.clone();
        let mut changes = Vec::new();
        let root = doc.as_object_mut().ok_or(MigrationError::NotAnObject)?;

        if !root.contains_key("history") {
            if let Some(legacy) = root.remove("phaseHistory") {
                root.insert("history".to_string(), legacy);
                changes.push("phaseHistory:renamed_to_history".to_string());
            }
        }

        let status = match root.get("status") {
            Some(Value::String(raw)) => Some(
                raw.parse::<Status>()
                    .map_err(|e| self.fail(e.to_string()))?,
            ),
            Some(Value::Null) | None => None,
            Some(other) => return Err(self.fail(format!("status must be a string, got {other}"))),
        };

        let phase = match root.get("phase") {
            Some(Value::String(raw)) => raw
                .parse::<Phase>()
                .map_err(|e| self.fail(e.to_string()))?,
            Some(other) => return Err(self.fail(format!("phase must be a string, got {other}"))),
            None => {
                let inferred = status.map_or(Phase::Discovery, Status::phase);
                root.insert("phase".to_string(), Value::String(inferred.to_string()));
                changes.push(format!("phase:initialized_{inferred}"));
                inferred
            }
        };

        if status.is_none() {
            let default = phase.default_status();
            root.insert("status".to_string(), Value::String(default.to_string()));
            changes.push(format!("status:initialized_{default}"));
        }

        if !root.contains_key("history") {
            root.insert("history".to_string(), Value::Array(Vec::new()));
            changes.push("history:initialized_empty".to_string());
        }

        Ok(StepOutcome {
            document: doc,
            changes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn fills_missing_tracking_fields() {
        let doc = json!({"id": "x", "payload": {}});
        let out = IntroducePhaseTracking.apply(&doc).unwrap();
        assert_eq!(out.document["phase"], json!("discovery"));
        assert_eq!(out.document["status"], json!("discovery_in_progress"));
        assert_eq!(out.document["history"], json!([]));
        assert_eq!(out.changes.len(), 3);
    }

    #[test]
    fn renames_phase_history() {
        let history = json!([{"fromPhase": null, "toPhase": "discovery",
            "timestamp": "2025-03-01T10:00:00Z", "transitionedBy": "consultant"}]);
        let doc = json!({"phase": "discovery", "status": "client_approved", "phaseHistory": history});
        let out = IntroducePhaseTracking.apply(&doc).unwrap();
        assert_eq!(out.document["history"], history);
        assert!(out.document.get("phaseHistory").is_none());
        assert_eq!(out.changes, vec!["phaseHistory:renamed_to_history"]);
    }

    #[test]
    fn infers_phase_from_status() {
        let doc = json!({"status": "dev_testing"});
        let out = IntroducePhaseTracking.apply(&doc).unwrap();
        assert_eq!(out.document["phase"], json!("development"));
        assert_eq!(out.document["status"], json!("dev_testing"));
    }

    #[test]
    fn unknown_phase_fails() {
        let err = IntroducePhaseTracking
            .apply(&json!({"phase": "review"}))
            .unwrap_err();
        assert!(matches!(err, MigrationError::StepFailed { from: 3, to: 4, .. }));
    }

    #[test]
    fn non_string_status_fails() {
        let err = IntroducePhaseTracking
            .apply(&json!({"phase": "discovery", "status": 3}))
            .unwrap_err();
        let MigrationError::StepFailed { reason, .. } = err else {
            panic!("expected a step failure, got {err:?}");
        };
        assert!(reason.contains("status must be a string"));
    }

    #[test]
    fn null_status_gets_phase_default() {
        let out = IntroducePhaseTracking
            .apply(&json!({"phase": "development", "status": null}))
            .unwrap();
        assert_eq!(out.document["status"], json!(Status::DevNotStarted.to_string()));
    }
}
