//! Load/save facade
//!
//! [`Lifecycle`] is the context object callers hold: it owns the document
//! store, migration engine, audit trail and state machine, and turns raw
//! stored documents into entities whose history chain is guaranteed intact.

use crate::check::{TransitionCheck, TransitionOutcome};
use crate::config::LifecycleConfig;
use crate::error::{LifecycleError, LifecycleResult};
use crate::machine::PhaseStateMachine;
use crate::store::{DocumentStore, FileDocumentStore, MemoryDocumentStore};
use crate::validator::JsonPayloadValidator;
use chrono::Utc;
use lifecycle_audit::{AuditSink, AuditTrail, FileAuditBackend};
use lifecycle_migration::{MigrationEngine, MigrationResult};
use lifecycle_model::{verify_chain, EntityId, Phase, PhaseTransition, WorkflowEntity};
use serde_json::Value;
use std::sync::Arc;

/// Actor recorded on synthesized genesis records
pub const SYSTEM_ACTOR: &str = "system";

/// Note attached to a synthesized genesis record
pub const RECONSTRUCTED_NOTE: &str = "history reconstructed: no usable backup";

/// Where a loaded entity's history came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistorySource {
    /// Stored document's own history passed the chain check
    Document,
    /// Stored history was missing or broken; the audit backup replaced it
    AuditBackup,
    /// Neither was usable; a genesis record for the current phase was created
    Synthesized,
}

/// Entity plus what loading had to do to it
#[derive(Debug, Clone)]
pub struct LoadedEntity {
    pub entity: WorkflowEntity,
    pub migration: MigrationResult,
    pub history_source: HistorySource,
    /// Whether the entity differs from the stored document
    pub needs_save: bool,
}

/// Counts from [`Lifecycle::migrate_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: usize,
    pub migrated: usize,
    /// Documents left untouched, with the reason
    pub failed: Vec<(EntityId, String)>,
}

/// Lifecycle context: store, migration, audit and state machine
#[derive(Debug)]
pub struct Lifecycle {
    store: Arc<dyn DocumentStore>,
    engine: MigrationEngine,
    trail: AuditTrail,
    machine: PhaseStateMachine,
    refuse_partial: bool,
}

impl Lifecycle {
    /// Context over `store` and `trail` with default engine and machine
    ///
    /// The machine backs up histories synchronously through `trail`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, trail: AuditTrail) -> Self {
        let machine = PhaseStateMachine::default().with_audit(Arc::new(trail.clone()));
        Self {
            store,
            engine: MigrationEngine::new(),
            trail,
            machine,
            refuse_partial: false,
        }
    }

    /// Fully in-memory context
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryDocumentStore::new()), AuditTrail::in_memory())
    }

    /// File-backed context built from configuration
    ///
    /// # Errors
    /// Returns error if the data or audit directory cannot be created
    pub fn from_config(config: &LifecycleConfig) -> LifecycleResult<Self> {
        let store = FileDocumentStore::open(&config.storage.data_dir)?;
        let trail = AuditTrail::new(Arc::new(FileAuditBackend::open(config.storage.audit_dir())?));
        let machine =
            PhaseStateMachine::from_config(Arc::new(JsonPayloadValidator), &config.cache)
                .with_audit(Arc::new(trail.clone()));
        Ok(Self {
            store: Arc::new(store),
            engine: MigrationEngine::new().with_log_capacity(config.migration.log_capacity),
            trail,
            machine,
            refuse_partial: config.migration.refuse_partial,
        })
    }

    /// With state machine
    #[must_use]
    pub fn with_machine(mut self, machine: PhaseStateMachine) -> Self {
        self.machine = machine;
        self
    }

    /// With migration engine
    #[must_use]
    pub fn with_engine(mut self, engine: MigrationEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Route transition backups through `audit` instead of the trail directly
    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.machine = self.machine.with_audit(audit);
        self
    }

    /// With partial-migration policy
    #[must_use]
    pub fn with_refuse_partial(mut self, refuse: bool) -> Self {
        self.refuse_partial = refuse;
        self
    }

    #[inline]
    #[must_use]
    pub fn machine(&self) -> &PhaseStateMachine {
        &self.machine
    }

    #[inline]
    #[must_use]
    pub fn engine(&self) -> &MigrationEngine {
        &self.engine
    }

    #[inline]
    #[must_use]
    pub fn trail(&self) -> &AuditTrail {
        &self.trail
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Create, store and back up a new discovery entity
    ///
    /// # Errors
    /// Returns error if the document cannot be stored
    pub fn create(&self, actor: &str) -> LifecycleResult<WorkflowEntity> {
        let entity = WorkflowEntity::new(actor);
        self.save(&entity)?;
        self.machine.audit().submit(entity.id, entity.history.clone());
        tracing::info!(entity = %entity.id, %actor, "entity created");
        Ok(entity)
    }

    /// Store `entity` as a current-version document
    ///
    /// # Errors
    /// Returns error if encoding or the store write fails
    pub fn save(&self, entity: &WorkflowEntity) -> LifecycleResult<()> {
        let document = entity.to_document()?;
        self.store.save(entity.id, &document)?;
        Ok(())
    }

    /// Migrate a raw document without storing anything
    #[must_use]
    pub fn migrate(&self, document: &Value) -> MigrationResult {
        self.engine.migrate(document)
    }

    /// Load, migrate and repair the entity stored under `id`
    ///
    /// A history that is empty or breaks the chain invariant is replaced by
    /// the audit backup when that backup is intact and ends in the entity's
    /// phase; otherwise by a synthesized genesis record. The repaired history
    /// is backed up again. Nothing is written to the store.
    ///
    /// # Errors
    /// - [`LifecycleError::MissingEntity`] if nothing is stored under `id`
    /// - [`LifecycleError::MigrationRefused`] if migration stopped early and
    ///   partial documents are refused
    /// - [`LifecycleError::IdMismatch`] if the document names another entity
    /// - decoding, store and audit read failures
    #[tracing::instrument(skip(self), fields(entity = %id))]
    pub fn load(&self, id: EntityId) -> LifecycleResult<LoadedEntity> {
        let raw = self
            .store
            .load(id)?
            .ok_or(LifecycleError::MissingEntity(id))?;

        let migration = self.engine.migrate(&raw);
        if !migration.is_complete() {
            if self.refuse_partial {
                return Err(LifecycleError::MigrationRefused {
                    id,
                    reached: migration.new_version,
                    errors: migration.errors,
                });
            }
            tracing::warn!(
                reached = migration.new_version,
                errors = ?migration.errors,
                "using partially migrated document"
            );
        }

        let mut document = migration.document.clone();
        claim_id(&mut document, id)?;
        let mut entity = WorkflowEntity::from_document(document)?;

        let history_source = self.repair_history(&mut entity)?;
        let needs_save = entity.to_document()? != raw;

        Ok(LoadedEntity {
            entity,
            migration,
            history_source,
            needs_save,
        })
    }

    fn repair_history(&self, entity: &mut WorkflowEntity) -> LifecycleResult<HistorySource> {
        let Err(defect) = entity.verify_history() else {
            return Ok(HistorySource::Document);
        };
        tracing::warn!(entity = %entity.id, %defect, "stored history unusable, recovering");

        let (history, source, refresh_backup) = match self.trail.restore(entity.id)? {
            Some(history) if verify_chain(&history, entity.phase).is_ok() => {
                (history, HistorySource::AuditBackup, true)
            }
            restored => {
                // An intact backup from another phase is not overwritten
                let keep_backup = restored.is_some();
                if let Some(discarded) = restored {
                    tracing::warn!(
                        entity = %entity.id,
                        phase = %entity.phase,
                        entries = discarded.len(),
                        history = %serde_json::to_string(&discarded).unwrap_or_default(),
                        "audit backup does not end in current phase, leaving it in place"
                    );
                }
                let genesis = PhaseTransition::genesis(entity.phase, SYSTEM_ACTOR, Utc::now())
                    .with_notes(Some(RECONSTRUCTED_NOTE.to_string()));
                tracing::warn!(entity = %entity.id, phase = %entity.phase, "synthesized genesis history");
                (vec![genesis], HistorySource::Synthesized, !keep_backup)
            }
        };

        entity.history = history;
        if refresh_backup {
            if let Err(e) = self.trail.backup(entity.id, &entity.history) {
                tracing::warn!(entity = %entity.id, error = %e, "backup of repaired history failed");
            }
        }
        Ok(source)
    }

    /// Migrate every stored document in place
    ///
    /// Documents whose migration stops early are left untouched in the store
    /// and reported as failed, whatever the partial-migration policy.
    ///
    /// # Errors
    /// Returns error only if the store cannot list its documents
    pub fn migrate_all(&self) -> LifecycleResult<BatchReport> {
        let mut report = BatchReport::default();
        for id in self.store.ids()? {
            report.processed += 1;
            match self.migrate_stored(id) {
                Ok(true) => report.migrated += 1,
                Ok(false) => {}
                Err(reason) => {
                    tracing::warn!(entity = %id, %reason, "batch migration failed");
                    report.failed.push((id, reason));
                }
            }
        }
        tracing::info!(
            processed = report.processed,
            migrated = report.migrated,
            failed = report.failed.len(),
            "batch migration finished"
        );
        Ok(report)
    }

    fn migrate_stored(&self, id: EntityId) -> Result<bool, String> {
        let raw = self
            .store
            .load(id)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| LifecycleError::MissingEntity(id).to_string())?;
        let migration = self.engine.migrate(&raw);
        if !migration.is_complete() {
            return Err(migration.errors.join("; "));
        }
        if !migration.migrated {
            return Ok(false);
        }
        self.store
            .save(id, &migration.document)
            .map_err(|e| e.to_string())?;
        Ok(true)
    }

    /// See [`PhaseStateMachine::can_transition`]
    #[must_use]
    pub fn can_transition(&self, entity: &WorkflowEntity, target: Phase) -> bool {
        self.machine.can_transition(entity, target)
    }

    /// See [`PhaseStateMachine::check_transition`]
    #[must_use]
    pub fn check_transition(&self, entity: &WorkflowEntity, target: Phase) -> TransitionCheck {
        self.machine.check_transition(entity, target)
    }

    /// See [`PhaseStateMachine::transition`]
    pub fn transition(
        &self,
        entity: &mut WorkflowEntity,
        target: Phase,
        actor: &str,
        notes: Option<&str>,
    ) -> TransitionOutcome {
        self.machine.transition(entity, target, actor, notes)
    }

    /// See [`PhaseStateMachine::get_progress`]
    #[must_use]
    pub fn progress(&self, entity: &WorkflowEntity, phase: Option<Phase>) -> u8 {
        self.machine.get_progress(entity, phase)
    }
}

/// Make sure `document` is keyed by `id`, inserting it when absent
fn claim_id(document: &mut Value, id: EntityId) -> LifecycleResult<()> {
    let Some(fields) = document.as_object_mut() else {
        // Left for the decoder to reject
        return Ok(());
    };
    match fields.get("id").filter(|v| !v.is_null()).cloned() {
        None => {
            fields.insert("id".to_string(), Value::String(id.to_string()));
            Ok(())
        }
        Some(found) if found.as_str().and_then(|s| s.parse::<EntityId>().ok()) == Some(id) => {
            Ok(())
        }
        Some(found) => Err(LifecycleError::IdMismatch {
            key: id,
            found: found.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifecycle_model::{Status, CURRENT_SCHEMA_VERSION};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn stored(lifecycle: &Lifecycle, document: Value) -> EntityId {
        let id = EntityId::new();
        lifecycle.store().save(id, &document).unwrap();
        id
    }

    #[test]
    fn created_entity_loads_unchanged() {
        let lifecycle = Lifecycle::in_memory();
        let entity = lifecycle.create("consultant").unwrap();
        let loaded = lifecycle.load(entity.id).unwrap();
        assert_eq!(loaded.entity, entity);
        assert_eq!(loaded.history_source, HistorySource::Document);
        assert!(!loaded.needs_save);
        assert!(!loaded.migration.migrated);
    }

    #[test]
    fn missing_entity_is_an_error() {
        let lifecycle = Lifecycle::in_memory();
        let id = EntityId::new();
        assert!(matches!(
            lifecycle.load(id),
            Err(LifecycleError::MissingEntity(missing)) if missing == id
        ));
    }

    #[test]
    fn missing_id_is_inserted() {
        let lifecycle = Lifecycle::in_memory();
        let id = stored(&lifecycle, json!({"schemaVersion": 1, "payload": {}}));
        let loaded = lifecycle.load(id).unwrap();
        assert_eq!(loaded.entity.id, id);
        assert_eq!(loaded.entity.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(loaded.entity.phase, Phase::Discovery);
        assert_eq!(loaded.history_source, HistorySource::Synthesized);
        assert!(loaded.needs_save);
    }

    #[test]
    fn foreign_id_is_rejected() {
        let lifecycle = Lifecycle::in_memory();
        let other = EntityId::new();
        let id = stored(&lifecycle, json!({"id": other.to_string(), "schemaVersion": 4}));
        assert!(matches!(lifecycle.load(id), Err(LifecycleError::IdMismatch { .. })));
    }

    #[test]
    fn broken_history_without_backup_is_synthesized() {
        let lifecycle = Lifecycle::in_memory();
        let id = stored(
            &lifecycle,
            json!({
                "schemaVersion": 4,
                "phase": "development",
                "status": "dev_testing",
                "history": [],
                "payload": {}
            }),
        );
        let loaded = lifecycle.load(id).unwrap();
        assert_eq!(loaded.history_source, HistorySource::Synthesized);
        assert_eq!(loaded.entity.status, Status::DevTesting);
        let genesis = &loaded.entity.history[0];
        assert_eq!(genesis.to_phase, Phase::Development);
        assert_eq!(genesis.actor, SYSTEM_ACTOR);
        assert_eq!(genesis.notes.as_deref(), Some(RECONSTRUCTED_NOTE));
        assert!(loaded.entity.history_is_consistent());
        assert!(lifecycle.trail().restore(id).unwrap().is_some());
    }

    #[test]
    fn refused_partial_migration() {
        let lifecycle = Lifecycle::in_memory().with_refuse_partial(true);
        let id = stored(&lifecycle, json!({"schemaVersion": 3, "phase": "review", "payload": {}}));
        assert!(matches!(
            lifecycle.load(id),
            Err(LifecycleError::MigrationRefused { reached: 3, .. })
        ));
    }

    #[test]
    fn claim_id_accepts_matching_id() {
        let id = EntityId::new();
        let mut document = json!({"id": id.to_string()});
        claim_id(&mut document, id).unwrap();
        assert_eq!(document, json!({"id": id.to_string()}));
    }
}
