use lifecycle_migration::{
    builtin_steps, MigrationEngine, RELOCATIONS, WRAPPED_LISTS,
};
use lifecycle_model::{Status, WorkflowEntity, CURRENT_SCHEMA_VERSION};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Representative v1 document: wrapped lists, fields in their old sections,
/// and no lifecycle fields
fn legacy_v1() -> Value {
    json!({
        "id": "01HZX3W9Q6T8KX6V1N3C5R7PBA",
        "clientName": "Acme Bakery",
        "payload": {
            "modules": {
                "overview": {"businessType": "retail", "employees": 14},
                "leadsAndSales": {
                    "leadSources": {
                        "sources": [{"channel": "website", "volumePerMonth": 40}],
                        "centralSystem": "hubspot"
                    }
                },
                "customerService": {
                    "channels": {"list": [{"type": "chat"}, {"type": "email"}]}
                },
                "operations": {
                    "teamSize": 6,
                    "systemSync": {"method": "zapier"},
                    "financialProcesses": {"invoicing": {"tool": "quickbooks"}, "payroll": "manual"}
                }
            }
        }
    })
}

fn leaves(value: &Value, prefix: &mut Vec<String>, out: &mut Vec<(Vec<String>, Value)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                prefix.push(key.clone());
                leaves(child, prefix, out);
                prefix.pop();
            }
        }
        other => out.push((prefix.clone(), other.clone())),
    }
}

/// Where a v1 leaf is expected to live after a full migration
fn relocated(path: &[String]) -> Vec<String> {
    for relocation in RELOCATIONS {
        if path.len() >= relocation.from.len()
            && path.iter().zip(relocation.from).all(|(a, b)| a == b)
        {
            let rest = &path[relocation.from.len()..];
            return relocation
                .to
                .iter()
                .map(|s| (*s).to_string())
                .chain(rest.iter().cloned())
                .collect();
        }
    }
    for list in &WRAPPED_LISTS {
        let field = ["payload", "modules", list.section, list.field];
        if path.len() > field.len() && path.iter().zip(field).all(|(a, b)| a == b) {
            let mut new_path: Vec<String> = field[..3].iter().map(|s| (*s).to_string()).collect();
            let key = &path[field.len()];
            if key == list.wrapper {
                new_path.push(list.field.to_string());
            } else {
                new_path.push(list.metadata_field.to_string());
                new_path.push(key.clone());
            }
            new_path.extend(path[field.len() + 1..].iter().cloned());
            return new_path;
        }
    }
    path.to_vec()
}

fn lookup<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, key| node.get(key.as_str()))
}

#[test]
fn test_v1_document_migrates_without_data_loss() {
    let engine = MigrationEngine::new();
    let original = legacy_v1();
    let result = engine.migrate(&original);

    assert!(result.migrated);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.original_version, 1);
    assert_eq!(result.new_version, CURRENT_SCHEMA_VERSION);
    assert_eq!(result.document["schemaVersion"], json!(CURRENT_SCHEMA_VERSION));
    assert_eq!(
        result.steps_applied,
        vec!["promote_wrapped_lists", "relocate_fields", "introduce_phase_tracking"]
    );

    let mut old_leaves = Vec::new();
    leaves(&original, &mut Vec::new(), &mut old_leaves);
    for (path, value) in old_leaves {
        let target = relocated(&path);
        assert_eq!(
            lookup(&result.document, &target),
            Some(&value),
            "{} expected at {}",
            path.join("."),
            target.join(".")
        );
    }
    assert!(engine.validate_migration(&result.document).is_empty());
}

#[test]
fn test_colliding_metadata_and_legacy_fields_are_all_kept() {
    let mut doc = legacy_v1();
    doc["payload"]["modules"]["leadsAndSales"]["leadSourcesMetadata"] =
        json!({"centralSystem": "salesforce"});
    doc["payload"]["modules"]["systems"] =
        json!({"systemSync": "native", "legacySystemSync": "csv export"});

    let result = MigrationEngine::new().migrate(&doc);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let modules = &result.document["payload"]["modules"];
    assert_eq!(
        modules["leadsAndSales"]["leadSourcesMetadata"],
        json!({"centralSystem": "salesforce", "legacyCentralSystem": "hubspot"})
    );
    assert_eq!(
        modules["systems"],
        json!({
            "systemSync": "native",
            "legacySystemSync": "csv export",
            "legacySystemSync2": {"method": "zapier"}
        })
    );
}

#[test]
fn test_migrated_document_decodes_as_entity() {
    let result = MigrationEngine::new().migrate(&legacy_v1());
    let entity = WorkflowEntity::from_document(result.document).unwrap();
    assert_eq!(entity.status, Status::DiscoveryInProgress);
    assert!(entity.history.is_empty());
    assert_eq!(entity.schema_version, CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_step_failure_keeps_last_reached_version() {
    let engine = MigrationEngine::new();
    let mut doc = legacy_v1();
    doc["phase"] = json!("review");
    let result = engine.migrate(&doc);

    assert_eq!(result.new_version, 3);
    assert_eq!(result.document["schemaVersion"], json!(3));
    assert_eq!(result.steps_applied.len(), 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("introduce_phase_tracking"));
    // Input untouched
    assert!(doc.get("schemaVersion").is_none());
}

#[test]
fn test_migration_log_is_bounded() {
    let engine = MigrationEngine::new().with_log_capacity(2);
    for _ in 0..5 {
        let _ = engine.migrate(&legacy_v1());
    }
    assert_eq!(engine.logs().len(), 2);
    assert!(engine.report(10).contains("Migrations logged: 2"));
    engine.clear_logs();
    assert!(engine.logs().is_empty());
}

/// Every string, number and boolean under `value`, arrays included
fn scalars(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Object(map) => map.values().for_each(|v| scalars(v, out)),
        Value::Array(items) => items.iter().for_each(|v| scalars(v, out)),
        Value::Null => {}
        other => out.push(other.clone()),
    }
}

fn list_shape(marker: &'static str, wrapper: &'static str) -> impl Strategy<Value = Option<Value>> {
    prop_oneof![
        Just(None),
        Just(Some(Value::Null)),
        Just(Some(json!([{marker: "web"}]))),
        "[a-z]{0,6}".prop_map(move |s| Some(json!({wrapper: [{marker: s}], "centralSystem": "crm"}))),
        "[a-z]{1,6}".prop_map(move |s| Some(json!({"x": {marker: s}, "note": "n"}))),
        any::<i64>().prop_map(|n| Some(json!(n))),
        "[a-z ]{0,8}".prop_map(|s| Some(Value::String(s))),
    ]
}

fn field_value() -> impl Strategy<Value = Option<Value>> {
    prop::option::of(prop_oneof![
        Just(json!("api")),
        Just(json!({"method": "zapier"})),
        any::<u16>().prop_map(|n| json!(n)),
    ])
}

prop_compose! {
    fn legacy_document()(
        leads in list_shape("channel", "sources"),
        channels in list_shape("type", "list"),
        sync in field_value(),
        existing_sync in field_value(),
        existing_legacy in field_value(),
        existing_metadata in prop::option::of("[a-z]{1,4}"),
        invoicing in field_value(),
        status in prop::option::of(prop::sample::select(Status::ALL.to_vec())),
        version in prop::option::of(1u32..=4),
    ) -> Value {
        let mut modules = Map::new();
        let mut leads_section = Map::new();
        if let Some(v) = leads {
            leads_section.insert("leadSources".into(), v);
        }
        if let Some(s) = existing_metadata {
            leads_section.insert(
                "leadSourcesMetadata".into(),
                json!({"centralSystem": s, "legacyValue": s}),
            );
        }
        if !leads_section.is_empty() {
            modules.insert("leadsAndSales".into(), Value::Object(leads_section));
        }
        if let Some(v) = channels {
            modules.insert("customerService".into(), json!({"channels": v}));
        }
        let mut operations = Map::new();
        if let Some(v) = sync {
            operations.insert("systemSync".into(), v);
        }
        if let Some(v) = invoicing {
            operations.insert("financialProcesses".into(), json!({"invoicing": v}));
        }
        modules.insert("operations".into(), Value::Object(operations));
        let mut systems = Map::new();
        if let Some(v) = existing_sync {
            systems.insert("systemSync".into(), v);
        }
        if let Some(v) = existing_legacy {
            systems.insert("legacySystemSync".into(), v);
        }
        if !systems.is_empty() {
            modules.insert("systems".into(), Value::Object(systems));
        }

        let mut doc = json!({"id": "e", "payload": {"modules": modules}});
        if let Some(s) = status {
            doc["status"] = json!(s.as_str());
        }
        if let Some(v) = version {
            doc["schemaVersion"] = json!(v);
        }
        doc
    }
}

proptest! {
    #[test]
    fn prop_every_step_is_idempotent(doc in legacy_document()) {
        for step in builtin_steps() {
            let once = step.apply(&doc).unwrap();
            let twice = step.apply(&once.document).unwrap();
            prop_assert_eq!(&twice.document, &once.document, "step {}", step.name());
            prop_assert!(twice.changes.is_empty());
        }
    }

    #[test]
    fn prop_migrating_twice_is_a_no_op(doc in legacy_document()) {
        let engine = MigrationEngine::new();
        let first = engine.migrate(&doc);
        prop_assert!(first.errors.is_empty());
        prop_assert_eq!(first.new_version, CURRENT_SCHEMA_VERSION);

        let second = engine.migrate(&first.document);
        prop_assert!(!second.migrated);
        prop_assert_eq!(second.document, first.document);
    }

    #[test]
    fn prop_payload_values_survive_migration(doc in legacy_document()) {
        let result = MigrationEngine::new().migrate(&doc);
        let mut before = Vec::new();
        scalars(&doc["payload"], &mut before);
        let mut after = Vec::new();
        scalars(&result.document["payload"], &mut after);
        for value in before {
            prop_assert!(after.contains(&value), "{} lost in {}", value, result.document);
        }
    }

    #[test]
    fn prop_version_never_decreases(doc in legacy_document()) {
        let result = MigrationEngine::new().migrate(&doc);
        prop_assert!(result.new_version >= result.original_version);
    }
}
