//! Phase state machine
//!
//! The only code path that changes an entity's `phase`, `status` or
//! `history`. Transitions move forward by exactly one phase:
//!
//! ```text
//! discovery → implementation_spec → development → completed
//! ```
//!
//! A rejected transition never mutates the entity. An applied one updates
//! phase, status and history together and then hands the new history to the
//! audit sink without waiting on it.

use crate::cache::{MokaValidationCache, ValidationCache, ValidationKey};
use crate::check::{Rejection, StatusRejection, TransitionCheck, TransitionOutcome};
use crate::config::CacheConfig;
use crate::validator::{JsonPayloadValidator, PayloadValidator};
use chrono::Utc;
use lifecycle_audit::{AuditSink, NullAuditSink};
use lifecycle_model::{Phase, PhaseTransition, Status, WorkflowEntity};
use std::sync::Arc;

/// Phases reachable from `from` in one legal step
#[must_use]
pub fn allowed_transitions(from: Phase) -> Vec<Phase> {
    from.next().into_iter().collect()
}

/// Check ordering rules only (no prerequisites)
///
/// # Errors
/// Returns the ordering rule `from → to` violates
pub fn validate_order(from: Phase, to: Phase) -> Result<(), Rejection> {
    match to.index().cmp(&from.index()) {
        std::cmp::Ordering::Equal => Err(Rejection::SamePhase(from)),
        std::cmp::Ordering::Less => Err(Rejection::Backward { from, to }),
        std::cmp::Ordering::Greater => match from.next() {
            Some(next) if next == to => Ok(()),
            Some(next) => Err(Rejection::Skipped { from, to, next }),
            // Nothing follows the last phase, so any greater index is unreachable
            None => Err(Rejection::Backward { from, to }),
        },
    }
}

/// Sole authority over phase and status changes
pub struct PhaseStateMachine {
    validator: Arc<dyn PayloadValidator>,
    cache: Arc<dyn ValidationCache>,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for PhaseStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseStateMachine")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Default for PhaseStateMachine {
    fn default() -> Self {
        Self::new(Arc::new(JsonPayloadValidator))
    }
}

impl PhaseStateMachine {
    /// Machine with `validator`, a default TTL cache and no audit sink
    #[must_use]
    pub fn new(validator: Arc<dyn PayloadValidator>) -> Self {
        Self {
            validator,
            cache: Arc::new(MokaValidationCache::default()),
            audit: Arc::new(NullAuditSink),
        }
    }

    /// Machine configured from [`CacheConfig`]
    #[must_use]
    pub fn from_config(validator: Arc<dyn PayloadValidator>, cache: &CacheConfig) -> Self {
        Self::new(validator).with_cache(Arc::new(MokaValidationCache::with_ttl(
            cache.max_capacity,
            cache.ttl(),
        )))
    }

    /// With validation cache
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ValidationCache>) -> Self {
        self.cache = cache;
        self
    }

    /// With audit sink
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Validation cache in use
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn ValidationCache> {
        &self.cache
    }

    /// Sink receiving histories after applied transitions
    #[inline]
    #[must_use]
    pub fn audit(&self) -> &Arc<dyn AuditSink> {
        &self.audit
    }

    /// Whether `entity` may move to `target`
    #[must_use]
    pub fn can_transition(&self, entity: &WorkflowEntity, target: Phase) -> bool {
        self.check_transition(entity, target).allowed
    }

    /// Full transition check, served from the cache when fresh
    #[must_use]
    pub fn check_transition(&self, entity: &WorkflowEntity, target: Phase) -> TransitionCheck {
        let key = ValidationKey {
            entity_id: entity.id,
            phase: entity.phase,
            target,
            status: entity.status,
        };
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(entity = %entity.id, %target, "validation cache hit");
            return hit;
        }
        let check = self.evaluate(entity, target);
        self.cache.insert(key, check.clone());
        check
    }

    fn evaluate(&self, entity: &WorkflowEntity, target: Phase) -> TransitionCheck {
        let progress = self.validator.progress(entity, entity.phase);
        if let Err(rejection) = validate_order(entity.phase, target) {
            return TransitionCheck::reject(rejection, progress);
        }

        let missing = if entity.phase == Phase::Discovery {
            // Set by the client-approval workflow; only read here
            if entity.status == Status::ClientApproved {
                Vec::new()
            } else {
                vec![format!("client approval required (status is {})", entity.status)]
            }
        } else {
            self.validator.prerequisites(entity, target).missing
        };

        if missing.is_empty() {
            TransitionCheck::allow(progress)
        } else {
            TransitionCheck::reject(Rejection::Prerequisites(missing), progress)
        }
    }

    /// Move `entity` to `target` if allowed
    ///
    /// On success the new record is appended to history, phase and status are
    /// set to `target` and its default status, and the full history is handed
    /// to the audit sink. On rejection nothing changes.
    pub fn transition(
        &self,
        entity: &mut WorkflowEntity,
        target: Phase,
        actor: &str,
        notes: Option<&str>,
    ) -> TransitionOutcome {
        let check = self.check_transition(entity, target);
        if let Some(rejection) = check.rejection {
            tracing::warn!(
                entity = %entity.id,
                from = %entity.phase,
                to = %target,
                reason = %rejection,
                "transition rejected"
            );
            return TransitionOutcome::Rejected(rejection);
        }

        let record = PhaseTransition::new(entity.phase, target, actor, Utc::now())
            .with_notes(notes.map(str::to_string));
        let from = entity.phase;

        entity.history.push(record.clone());
        entity.phase = target;
        entity.status = target.default_status();

        tracing::info!(entity = %entity.id, %from, to = %target, %actor, "phase transition applied");
        self.audit.submit(entity.id, entity.history.clone());
        TransitionOutcome::Applied(record)
    }

    /// [`transition`](Self::transition) with a phase name parsed case-insensitively
    ///
    /// Unknown names are rejected like any other illegal transition.
    pub fn transition_named(
        &self,
        entity: &mut WorkflowEntity,
        target: &str,
        actor: &str,
        notes: Option<&str>,
    ) -> TransitionOutcome {
        match target.parse::<Phase>() {
            Ok(phase) => self.transition(entity, phase, actor, notes),
            Err(_) => {
                tracing::warn!(entity = %entity.id, target, "transition to unknown phase rejected");
                TransitionOutcome::Rejected(Rejection::UnknownPhase(target.to_string()))
            }
        }
    }

    /// Change status within the current phase
    ///
    /// History is never touched. Setting the current status again succeeds.
    ///
    /// # Errors
    /// Returns the rejection if `status` belongs to another phase; the entity
    /// is unchanged
    pub fn update_status(
        &self,
        entity: &mut WorkflowEntity,
        status: Status,
    ) -> Result<(), StatusRejection> {
        if !status.belongs_to(entity.phase) {
            let rejection = StatusRejection::WrongPhase {
                status,
                owner: status.phase(),
                current: entity.phase,
            };
            tracing::warn!(entity = %entity.id, reason = %rejection, "status update rejected");
            return Err(rejection);
        }
        if entity.status != status {
            tracing::info!(entity = %entity.id, from = %entity.status, to = %status, "status updated");
            entity.status = status;
        }
        Ok(())
    }

    /// [`update_status`](Self::update_status) with a status name parsed case-insensitively
    ///
    /// # Errors
    /// Returns the rejection if the name is unknown or belongs to another phase
    pub fn update_status_named(
        &self,
        entity: &mut WorkflowEntity,
        status: &str,
    ) -> Result<(), StatusRejection> {
        let parsed = status.parse::<Status>().map_err(|_| {
            tracing::warn!(entity = %entity.id, status, "unknown status rejected");
            StatusRejection::Unknown(status.to_string())
        })?;
        self.update_status(entity, parsed)
    }

    /// Transition history, oldest first
    #[inline]
    #[must_use]
    pub fn get_history<'a>(&self, entity: &'a WorkflowEntity) -> &'a [PhaseTransition] {
        &entity.history
    }

    /// Progress of `phase` (default: the current phase), 0..=100
    ///
    /// Phases already left report 100, phases not reached yet report 0.
    #[must_use]
    pub fn get_progress(&self, entity: &WorkflowEntity, phase: Option<Phase>) -> u8 {
        let phase = phase.unwrap_or(entity.phase);
        match phase.index().cmp(&entity.phase.index()) {
            std::cmp::Ordering::Less => 100,
            std::cmp::Ordering::Greater => 0,
            std::cmp::Ordering::Equal => self.validator.progress(entity, phase),
        }
    }
}
