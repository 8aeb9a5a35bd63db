use lifecycle_audit::{AuditBackend, AuditTrail, BackgroundAuditWriter, FileAuditBackend};
use lifecycle_core::{
    DocumentStore, FileDocumentStore, HistorySource, Lifecycle, LifecycleConfig, LifecycleError,
    MemoryDocumentStore, RECONSTRUCTED_NOTE,
};
use lifecycle_model::{EntityId, Phase, Status, CURRENT_SCHEMA_VERSION};
use lifecycle_test_utils::{legacy_v1_document, setup_test_lifecycle, spec_ready_payload};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

/// Drive a fresh entity to development and store it
fn developed(lifecycle: &Lifecycle) -> lifecycle_model::WorkflowEntity {
    let mut entity = lifecycle.create("consultant").unwrap();
    lifecycle
        .machine()
        .update_status(&mut entity, Status::ClientApproved)
        .unwrap();
    assert!(lifecycle
        .transition(&mut entity, Phase::ImplementationSpec, "consultant", None)
        .is_applied());
    entity.payload = spec_ready_payload();
    assert!(lifecycle
        .transition(&mut entity, Phase::Development, "consultant", None)
        .is_applied());
    lifecycle.save(&entity).unwrap();
    entity
}

fn wipe_history(lifecycle: &Lifecycle, id: EntityId) {
    let mut document = lifecycle.store().load(id).unwrap().unwrap();
    document["history"] = json!([]);
    lifecycle.store().save(id, &document).unwrap();
}

#[test]
fn test_history_restored_after_primary_loss() {
    let lifecycle = setup_test_lifecycle();
    let entity = developed(&lifecycle);
    wipe_history(&lifecycle, entity.id);

    let loaded = lifecycle.load(entity.id).unwrap();
    assert_eq!(loaded.history_source, HistorySource::AuditBackup);
    assert_eq!(loaded.entity.history, entity.history);
    assert!(loaded.needs_save);

    lifecycle.save(&loaded.entity).unwrap();
    let reloaded = lifecycle.load(entity.id).unwrap();
    assert_eq!(reloaded.history_source, HistorySource::Document);
    assert_eq!(reloaded.entity, entity);
}

#[test]
fn test_truncated_history_is_recovered() {
    let lifecycle = setup_test_lifecycle();
    let entity = developed(&lifecycle);
    let mut document = lifecycle.store().load(entity.id).unwrap().unwrap();
    document["history"].as_array_mut().unwrap().truncate(2);
    lifecycle.store().save(entity.id, &document).unwrap();

    let loaded = lifecycle.load(entity.id).unwrap();
    assert_eq!(loaded.history_source, HistorySource::AuditBackup);
    assert_eq!(loaded.entity.history.len(), 3);
}

#[test]
fn test_corrupt_backup_falls_back_to_genesis() {
    let lifecycle = setup_test_lifecycle();
    let entity = developed(&lifecycle);
    wipe_history(&lifecycle, entity.id);

    let backend = lifecycle.trail().backend();
    let mut bytes = backend.get(entity.id).unwrap().unwrap();
    let text = String::from_utf8(bytes.clone()).unwrap();
    let at = text.find("consultant").unwrap() + "consultan".len();
    bytes[at] ^= 0x01;
    backend.put(entity.id, &bytes).unwrap();

    let loaded = lifecycle.load(entity.id).unwrap();
    assert_eq!(loaded.history_source, HistorySource::Synthesized);
    assert_eq!(loaded.entity.phase, Phase::Development);
    assert_eq!(loaded.entity.history.len(), 1);
    assert_eq!(loaded.entity.history[0].notes.as_deref(), Some(RECONSTRUCTED_NOTE));
    assert!(loaded.entity.history_is_consistent());
}

#[test]
fn test_backup_from_other_phase_is_left_intact() {
    let lifecycle = setup_test_lifecycle();
    let entity = developed(&lifecycle);
    let mut document = lifecycle.store().load(entity.id).unwrap().unwrap();
    document["phase"] = json!("completed");
    document["status"] = json!("completed");
    lifecycle.store().save(entity.id, &document).unwrap();

    let loaded = lifecycle.load(entity.id).unwrap();
    assert_eq!(loaded.history_source, HistorySource::Synthesized);
    assert_eq!(loaded.entity.history.len(), 1);
    assert_eq!(loaded.entity.history[0].to_phase, Phase::Completed);
    assert_eq!(
        lifecycle.trail().restore(entity.id).unwrap(),
        Some(entity.history.clone())
    );
}

#[test]
fn test_legacy_document_loads_at_current_version() {
    let lifecycle = setup_test_lifecycle();
    let id = EntityId::new();
    lifecycle.store().save(id, &legacy_v1_document()).unwrap();

    let loaded = lifecycle.load(id).unwrap();
    assert!(loaded.migration.migrated);
    assert_eq!(loaded.migration.original_version, 1);
    assert_eq!(loaded.entity.schema_version, CURRENT_SCHEMA_VERSION);
    assert_eq!(loaded.entity.phase, Phase::Discovery);
    assert_eq!(
        loaded.entity.payload["modules"]["systems"]["systemSync"],
        json!({"method": "zapier"})
    );
    assert!(lifecycle.engine().validate_migration(&loaded.migration.document).is_empty());
}

#[test]
fn test_accepted_partial_migration_still_needs_decodable_document() {
    let lifecycle = setup_test_lifecycle();
    let id = EntityId::new();
    lifecycle
        .store()
        .save(id, &json!({"schemaVersion": 3, "phase": "review", "payload": {}}))
        .unwrap();
    assert!(matches!(lifecycle.load(id), Err(LifecycleError::Model(_))));
}

#[test]
fn test_v3_document_with_empty_history_gets_genesis() {
    let lifecycle = setup_test_lifecycle();
    let id = EntityId::new();
    lifecycle
        .store()
        .save(
            id,
            &json!({
                "schemaVersion": 3,
                "phase": "discovery",
                "status": "discovery_complete",
                "history": [],
                "payload": {}
            }),
        )
        .unwrap();
    let loaded = lifecycle.load(id).unwrap();
    assert!(loaded.migration.is_complete());
    assert_eq!(loaded.entity.status, Status::DiscoveryComplete);
    assert_eq!(loaded.history_source, HistorySource::Synthesized);
}

#[test]
fn test_migrate_all_reports_counts() {
    let store = Arc::new(MemoryDocumentStore::new());
    let lifecycle = Lifecycle::new(store.clone(), AuditTrail::in_memory());

    let current = lifecycle.create("consultant").unwrap();
    let legacy = EntityId::new();
    store.insert_raw(legacy, legacy_v1_document());
    let broken = EntityId::new();
    store.insert_raw(broken, json!({"schemaVersion": 3, "phase": "review"}));

    let report = lifecycle.migrate_all().unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(report.migrated, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, broken);

    let stored = store.load(legacy).unwrap().unwrap();
    assert_eq!(stored["schemaVersion"], json!(CURRENT_SCHEMA_VERSION));
    assert_eq!(
        store.load(broken).unwrap().unwrap(),
        json!({"schemaVersion": 3, "phase": "review"})
    );
    assert!(!lifecycle.load(current.id).unwrap().needs_save);

    let again = lifecycle.migrate_all().unwrap();
    assert_eq!(again.migrated, 0);
}

#[test]
fn test_file_backed_lifecycle_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = LifecycleConfig::new().with_data_dir(dir.path().join("data"));

    let id = {
        let lifecycle = Lifecycle::from_config(&config).unwrap();
        developed(&lifecycle).id
    };

    let store = FileDocumentStore::open(dir.path().join("data")).unwrap();
    let path = store.document_path(id);
    let mut document: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    document.as_object_mut().unwrap().remove("history");
    std::fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();

    let lifecycle = Lifecycle::from_config(&config).unwrap();
    let loaded = lifecycle.load(id).unwrap();
    assert_eq!(loaded.history_source, HistorySource::AuditBackup);
    assert_eq!(loaded.entity.history.len(), 3);
    assert_eq!(lifecycle.store().ids().unwrap(), vec![id]);
}

#[test]
fn test_refused_partial_migration_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = LifecycleConfig::new()
        .with_data_dir(dir.path())
        .with_refuse_partial(true);
    let lifecycle = Lifecycle::from_config(&config).unwrap();
    let id = EntityId::new();
    lifecycle
        .store()
        .save(id, &json!({"schemaVersion": 2, "phase": 7}))
        .unwrap();
    let err = lifecycle.load(id).unwrap_err();
    assert!(matches!(err, LifecycleError::MigrationRefused { reached: 3, .. }));
}

#[tokio::test]
async fn test_background_writer_backs_up_transitions() {
    let dir = tempfile::tempdir().unwrap();
    let trail = AuditTrail::new(Arc::new(FileAuditBackend::open(dir.path()).unwrap()));
    let writer = Arc::new(BackgroundAuditWriter::spawn(trail.clone()));
    let lifecycle = Lifecycle::new(Arc::new(MemoryDocumentStore::new()), trail.clone())
        .with_audit_sink(writer.clone());

    let entity = developed(&lifecycle);
    let stats = writer.shutdown().await.unwrap();
    assert_eq!(stats.written, 3);
    assert_eq!(trail.restore(entity.id).unwrap(), Some(entity.history));
}
