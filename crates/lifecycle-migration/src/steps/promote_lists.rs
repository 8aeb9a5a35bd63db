//! v1 → v2: unwrap object-wrapped lists into bare arrays
//!
//! v1 stored some lists inside a wrapper object (`{sources: [...], centralSystem: ...}`).
//! v2 stores the bare array and keeps the wrapper's other keys in a sibling
//! metadata field.

use crate::error::MigrationError;
use crate::path;
use crate::step::{MigrationStep, StepOutcome};
use serde_json::{Map, Value};

/// A list that v1 wrapped in an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrappedList {
    /// Section under `payload.modules`
    pub section: &'static str,
    /// Field holding the list
    pub field: &'static str,
    /// Key inside the v1 wrapper that held the items
    pub wrapper: &'static str,
    /// Sibling field that receives the wrapper's other keys
    pub metadata_field: &'static str,
    /// Key that identifies a list item when recovering malformed wrappers
    pub item_marker: &'static str,
}

/// Lists promoted by [`PromoteWrappedLists`]
pub const WRAPPED_LISTS: [WrappedList; 2] = [
    WrappedList {
        section: "leadsAndSales",
        field: "leadSources",
        wrapper: "sources",
        metadata_field: "leadSourcesMetadata",
        item_marker: "channel",
    },
    WrappedList {
        section: "customerService",
        field: "channels",
        wrapper: "list",
        metadata_field: "channelsMetadata",
        item_marker: "type",
    },
];

/// Unwraps every entry in [`WRAPPED_LISTS`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PromoteWrappedLists;

impl MigrationStep for PromoteWrappedLists {
    fn source_version(&self) -> u32 {
        1
    }

    fn name(&self) -> &'static str {
        "promote_wrapped_lists"
    }

    fn apply(&self, document: &Value) -> Result<StepOutcome, MigrationError> {
        let mut doc = document.clone();
        let mut changes = Vec::new();

        let root = doc.as_object_mut().ok_or(MigrationError::NotAnObject)?;
        let payload = root
            .entry("payload")
            .or_insert_with(|| Value::Object(Map::new()));
        let payload = payload
            .as_object_mut()
            .ok_or_else(|| MigrationError::unexpected_shape(&["payload"], "object"))?;

        if !payload.contains_key("modules") {
            payload.insert("modules".to_string(), Value::Object(Map::new()));
            changes.push("modules:initialized_empty".to_string());
        }
        let modules = payload
            .get_mut("modules")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| MigrationError::unexpected_shape(&["payload", "modules"], "object"))?;

        for list in &WRAPPED_LISTS {
            // Absent or non-object sections are not ours to shape
            let Some(section) = modules.get_mut(list.section).and_then(Value::as_object_mut) else {
                continue;
            };
            if let Some(change) = promote(section, list) {
                changes.push(format!("{}.{}:{change}", list.section, list.field));
            }
        }

        Ok(StepOutcome {
            document: doc,
            changes,
        })
    }
}

/// Promote one list in `section`, returning the change identifier if anything moved
fn promote(section: &mut Map<String, Value>, list: &WrappedList) -> Option<&'static str> {
    let current = section.get(list.field).cloned().unwrap_or(Value::Null);
    match current {
        Value::Array(_) => None,
        Value::Null => {
            section.insert(list.field.to_string(), Value::Array(Vec::new()));
            Some("initialized_empty")
        }
        Value::Object(mut wrapper) if wrapper.contains_key(list.wrapper) => {
            let items = match wrapper.remove(list.wrapper) {
                Some(Value::Array(items)) => items,
                Some(Value::Null) | None => Vec::new(),
                // Keep a non-list payload with the metadata instead of dropping it
                Some(other) => {
                    wrapper.insert(list.wrapper.to_string(), other);
                    Vec::new()
                }
            };
            section.insert(list.field.to_string(), Value::Array(items));
            if wrapper.is_empty() {
                Some("object_to_array")
            } else {
                stash_metadata(section, list.metadata_field, wrapper);
                Some("object_to_array_preserved_metadata")
            }
        }
        Value::Object(malformed) => {
            let recovered: Vec<Value> = malformed
                .values()
                .filter(|v| v.get(list.item_marker).is_some())
                .cloned()
                .collect();
            let change = if recovered.is_empty() {
                "reset_empty"
            } else {
                "recovered_from_malformed_object"
            };
            section.insert(list.field.to_string(), Value::Array(recovered));
            stash_legacy(section, list.metadata_field, Value::Object(malformed));
            Some(change)
        }
        scalar => {
            section.insert(list.field.to_string(), Value::Array(Vec::new()));
            stash_legacy(section, list.metadata_field, scalar);
            Some("reset_invalid_type")
        }
    }
}

/// Merge `entries` into the metadata object, never overwriting existing keys
///
/// An entry whose key is taken by a different value goes under `legacy<Key>`
/// (or the next free numbered variant).
fn stash_metadata(section: &mut Map<String, Value>, field: &str, entries: Map<String, Value>) {
    let slot = section
        .entry(field.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        let previous = slot.take();
        let mut wrapped = Map::new();
        wrapped.insert("previous".to_string(), previous);
        *slot = Value::Object(wrapped);
    }
    if let Some(target) = slot.as_object_mut() {
        for (key, value) in entries {
            let base = match target.get(&key) {
                None => key,
                Some(existing) if *existing == value => continue,
                Some(_) => path::legacy_name(&key),
            };
            if let Some(free) = path::free_slot(target, &base, &value) {
                target.insert(free, value);
            }
        }
    }
}

/// Keep the unrecognized v1 value under `<metadata>.legacyValue`
fn stash_legacy(section: &mut Map<String, Value>, field: &str, value: Value) {
    let mut entries = Map::new();
    entries.insert("legacyValue".to_string(), value);
    stash_metadata(section, field, entries);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc_with(section: &str, field: &str, value: Value) -> Value {
        json!({"payload": {"modules": {section: {field: value}}}})
    }

    #[test]
    fn unwraps_sources_and_keeps_metadata() {
        let doc = doc_with(
            "leadsAndSales",
            "leadSources",
            json!({"sources": [{"channel": "web"}], "centralSystem": "crm"}),
        );
        let out = PromoteWrappedLists.apply(&doc).unwrap();
        let section = &out.document["payload"]["modules"]["leadsAndSales"];
        assert_eq!(section["leadSources"], json!([{"channel": "web"}]));
        assert_eq!(section["leadSourcesMetadata"], json!({"centralSystem": "crm"}));
        assert_eq!(
            out.changes,
            vec!["leadsAndSales.leadSources:object_to_array_preserved_metadata"]
        );
    }

    #[test]
    fn recovers_items_from_malformed_wrapper() {
        let doc = doc_with(
            "customerService",
            "channels",
            json!({"a": {"type": "email"}, "note": "legacy"}),
        );
        let out = PromoteWrappedLists.apply(&doc).unwrap();
        let section = &out.document["payload"]["modules"]["customerService"];
        assert_eq!(section["channels"], json!([{"type": "email"}]));
        assert_eq!(
            section["channelsMetadata"]["legacyValue"],
            json!({"a": {"type": "email"}, "note": "legacy"})
        );
    }

    #[test]
    fn scalar_is_reset_but_kept() {
        let doc = doc_with("leadsAndSales", "leadSources", json!("web, phone"));
        let out = PromoteWrappedLists.apply(&doc).unwrap();
        let section = &out.document["payload"]["modules"]["leadsAndSales"];
        assert_eq!(section["leadSources"], json!([]));
        assert_eq!(section["leadSourcesMetadata"]["legacyValue"], json!("web, phone"));
    }

    #[test]
    fn existing_metadata_key_keeps_both_values() {
        let doc = json!({"payload": {"modules": {"leadsAndSales": {
            "leadSources": {"sources": [], "centralSystem": "crm"},
            "leadSourcesMetadata": {"centralSystem": "old"}
        }}}});
        let out = PromoteWrappedLists.apply(&doc).unwrap();
        let metadata = &out.document["payload"]["modules"]["leadsAndSales"]["leadSourcesMetadata"];
        assert_eq!(
            *metadata,
            json!({"centralSystem": "old", "legacyCentralSystem": "crm"})
        );
    }

    #[test]
    fn second_legacy_value_gets_numbered_key() {
        let doc = json!({"payload": {"modules": {"customerService": {
            "channels": "phone only",
            "channelsMetadata": {"legacyValue": "email only"}
        }}}});
        let out = PromoteWrappedLists.apply(&doc).unwrap();
        let metadata = &out.document["payload"]["modules"]["customerService"]["channelsMetadata"];
        assert_eq!(
            *metadata,
            json!({"legacyValue": "email only", "legacyValue2": "phone only"})
        );
    }

    #[test]
    fn equal_metadata_is_not_duplicated() {
        let doc = json!({"payload": {"modules": {"leadsAndSales": {
            "leadSources": {"sources": [], "centralSystem": "crm"},
            "leadSourcesMetadata": {"centralSystem": "crm"}
        }}}});
        let out = PromoteWrappedLists.apply(&doc).unwrap();
        let metadata = &out.document["payload"]["modules"]["leadsAndSales"]["leadSourcesMetadata"];
        assert_eq!(*metadata, json!({"centralSystem": "crm"}));
    }

    #[test]
    fn arrays_are_left_alone() {
        let doc = doc_with("leadsAndSales", "leadSources", json!([{"channel": "web"}]));
        let out = PromoteWrappedLists.apply(&doc).unwrap();
        assert_eq!(out.document, doc);
        assert!(out.changes.is_empty());
    }

    #[test]
    fn input_is_not_mutated() {
        let doc = doc_with("leadsAndSales", "leadSources", json!({"sources": []}));
        let before = doc.clone();
        let _ = PromoteWrappedLists.apply(&doc).unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn non_object_payload_fails() {
        let err = PromoteWrappedLists.apply(&json!({"payload": [1, 2]})).unwrap_err();
        assert!(matches!(err, MigrationError::UnexpectedShape { .. }));
    }
}
