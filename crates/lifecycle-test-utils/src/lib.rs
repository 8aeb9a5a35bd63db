//! Testing utilities for the lifecycle workspace
//!
//! Shared fixtures, validators and setup helpers.

#![allow(missing_docs)]

use lifecycle_core::{
    JsonPayloadValidator, Lifecycle, NoopValidationCache, PayloadValidator, PhaseStateMachine,
    PrerequisiteReport,
};
use lifecycle_model::{Phase, Status, WorkflowEntity};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Validator that approves every move and reports full progress
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveValidator;

impl PayloadValidator for PermissiveValidator {
    fn prerequisites(&self, _entity: &WorkflowEntity, _target: Phase) -> PrerequisiteReport {
        PrerequisiteReport::satisfied()
    }

    fn progress(&self, _entity: &WorkflowEntity, _phase: Phase) -> u8 {
        100
    }
}

/// Wraps a validator and counts how often the machine consults it
#[derive(Debug, Default)]
pub struct CountingValidator<V> {
    inner: V,
    prerequisite_calls: AtomicUsize,
    progress_calls: AtomicUsize,
}

impl<V: PayloadValidator> CountingValidator<V> {
    pub fn new(inner: V) -> Self {
        Self {
            inner,
            prerequisite_calls: AtomicUsize::new(0),
            progress_calls: AtomicUsize::new(0),
        }
    }

    pub fn prerequisite_calls(&self) -> usize {
        self.prerequisite_calls.load(Ordering::SeqCst)
    }

    pub fn progress_calls(&self) -> usize {
        self.progress_calls.load(Ordering::SeqCst)
    }
}

impl<V: PayloadValidator> PayloadValidator for CountingValidator<V> {
    fn prerequisites(&self, entity: &WorkflowEntity, target: Phase) -> PrerequisiteReport {
        self.prerequisite_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.prerequisites(entity, target)
    }

    fn progress(&self, entity: &WorkflowEntity, phase: Phase) -> u8 {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.progress(entity, phase)
    }
}

pub fn counting_json_validator() -> Arc<CountingValidator<JsonPayloadValidator>> {
    Arc::new(CountingValidator::new(JsonPayloadValidator))
}

/// Machine that never caches and never refuses on payload grounds
pub fn permissive_machine() -> PhaseStateMachine {
    PhaseStateMachine::new(Arc::new(PermissiveValidator)).with_cache(Arc::new(NoopValidationCache))
}

pub fn setup_test_lifecycle() -> Lifecycle {
    Lifecycle::in_memory()
}

/// Discovery entity the client has approved
pub fn approved_entity() -> WorkflowEntity {
    let mut entity = WorkflowEntity::new("consultant");
    entity.status = Status::ClientApproved;
    entity
}

/// Entity walked forward to `phase` with a permissive machine
pub fn entity_in_phase(phase: Phase, payload: Value) -> WorkflowEntity {
    let machine = permissive_machine();
    let mut entity = approved_entity();
    entity.payload = payload;
    while entity.phase != phase {
        let next = entity.phase.next().unwrap();
        assert!(machine.transition(&mut entity, next, "fixture", None).is_applied());
    }
    entity
}

/// Spec payload at `completion` percent with one purchased, specified service
pub fn spec_payload(completion: u8) -> Value {
    json!({
        "modules": {
            "proposal": {
                "purchasedServices": [
                    {"id": "auto-lead-response", "name": "Lead auto-response", "nameHe": "מענה אוטומטי ללידים"}
                ]
            }
        },
        "implementationSpec": {
            "completionPercentage": completion,
            "automations": [{"serviceId": "auto-lead-response", "trigger": "new lead"}]
        }
    })
}

/// Spec payload that satisfies every spec → development prerequisite
pub fn spec_ready_payload() -> Value {
    spec_payload(100)
}

/// Development payload with `done` finished tasks, `open` unfinished ones
/// and `blockers` unresolved blockers
pub fn dev_payload(done: usize, open: usize, blockers: usize) -> Value {
    let tasks: Vec<Value> = (0..done)
        .map(|i| json!({"id": format!("done-{i}"), "status": "done"}))
        .chain((0..open).map(|i| json!({"id": format!("open-{i}"), "status": "in_progress"})))
        .collect();
    let blockers: Vec<Value> = (0..blockers)
        .map(|i| json!({"id": format!("blocker-{i}"), "status": "open"}))
        .collect();
    json!({"developmentTracking": {"tasks": tasks, "blockers": blockers}})
}

/// Version 1 document with wrapped lists, fields in their old sections and
/// no lifecycle fields
pub fn legacy_v1_document() -> Value {
    json!({
        "clientName": "Acme Bakery",
        "payload": {
            "modules": {
                "leadsAndSales": {
                    "leadSources": {
                        "sources": [{"channel": "website", "volumePerMonth": 40}],
                        "centralSystem": "hubspot"
                    }
                },
                "customerService": {
                    "channels": {"list": [{"type": "chat"}]}
                },
                "operations": {
                    "systemSync": {"method": "zapier"},
                    "financialProcesses": {"invoicing": {"tool": "quickbooks"}}
                }
            }
        }
    })
}
