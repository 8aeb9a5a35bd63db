//! v2 → v3: move fields that changed owning section

use crate::error::MigrationError;
use crate::path;
use crate::step::{MigrationStep, StepOutcome};
use serde_json::Value;

/// A field that moved between payload sections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    /// Path in a v2 document
    pub from: &'static [&'static str],
    /// Path in a v3 document
    pub to: &'static [&'static str],
}

impl Relocation {
    /// Sibling of `to` that receives the source when `to` already holds a different value
    ///
    /// This is the first choice; [`RelocateFields`] falls back to a numbered
    /// variant when it is taken too.
    #[must_use]
    pub fn conflict_path(&self) -> Vec<String> {
        let Some((last, parents)) = self.to.split_last() else {
            return Vec::new();
        };
        parents
            .iter()
            .map(|s| (*s).to_string())
            .chain(std::iter::once(path::legacy_name(last)))
            .collect()
    }
}

/// Fields relocated by [`RelocateFields`]
pub const RELOCATIONS: &[Relocation] = &[
    Relocation {
        from: &["payload", "modules", "operations", "systemSync"],
        to: &["payload", "modules", "systems", "systemSync"],
    },
    Relocation {
        from: &["payload", "modules", "operations", "financialProcesses", "invoicing"],
        to: &["payload", "modules", "reporting", "invoicing"],
    },
];

/// Applies every entry in [`RELOCATIONS`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RelocateFields;

impl MigrationStep for RelocateFields {
    fn source_version(&self) -> u32 {
        2
    }

    fn name(&self) -> &'static str {
        "relocate_fields"
    }

    fn apply(&self, document: &Value) -> Result<StepOutcome, MigrationError> {
        if !document.is_object() {
            return Err(MigrationError::NotAnObject);
        }
        let mut doc = document.clone();
        let mut changes = Vec::new();

        for relocation in RELOCATIONS {
            let Some(value) = path::take(&mut doc, relocation.from) else {
                continue;
            };
            let label = relocation.from[1..].join(".");
            match path::get(&doc, relocation.to) {
                None | Some(Value::Null) => {
                    path::insert(&mut doc, relocation.to, value)?;
                    changes.push(format!("{label}:moved"));
                }
                Some(existing) if *existing == value => {
                    changes.push(format!("{label}:deduplicated"));
                }
                Some(_) => {
                    let Some((last, parents)) = relocation.to.split_last() else {
                        continue;
                    };
                    let siblings = path::get(&doc, parents)
                        .and_then(Value::as_object)
                        .ok_or_else(|| MigrationError::unexpected_shape(parents, "object"))?;
                    match path::free_slot(siblings, &path::legacy_name(last), &value) {
                        Some(slot) => {
                            let mut target: Vec<&str> = parents.to_vec();
                            target.push(&slot);
                            path::insert(&mut doc, &target, value)?;
                            changes.push(format!("{label}:moved_beside_conflict"));
                        }
                        None => changes.push(format!("{label}:deduplicated")),
                    }
                }
            }
        }

        Ok(StepOutcome {
            document: doc,
            changes,
        })
    }
}
