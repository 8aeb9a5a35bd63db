//! Path helpers over untyped JSON documents

use crate::error::MigrationError;
use serde_json::{Map, Value};

/// Look up the value at `path`
pub(crate) fn get<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, key| node.get(*key))
}

/// Remove and return the value at `path`
///
/// Intermediate objects are left in place even if they become empty.
pub(crate) fn take(root: &mut Value, path: &[&str]) -> Option<Value> {
    let (last, parents) = path.split_last()?;
    let mut node = root;
    for key in parents {
        node = node.get_mut(*key)?;
    }
    node.as_object_mut()?.remove(*last)
}

/// Write `value` at `path`, creating missing intermediate objects
///
/// # Errors
/// Returns [`MigrationError::UnexpectedShape`] if an existing intermediate is
/// not an object
pub(crate) fn insert(root: &mut Value, path: &[&str], value: Value) -> Result<(), MigrationError> {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return Ok(());
    };
    let mut node = root;
    for (depth, key) in parents.iter().enumerate() {
        let map = node
            .as_object_mut()
            .ok_or_else(|| MigrationError::unexpected_shape(&path[..depth], "object"))?;
        node = map
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let map = node
        .as_object_mut()
        .ok_or_else(|| MigrationError::unexpected_shape(parents, "object"))?;
    map.insert((*last).to_string(), value);
    Ok(())
}

/// `legacy<Field>` for a camelCase field; names already under `legacy` are kept
pub(crate) fn legacy_name(field: &str) -> String {
    if field.starts_with("legacy") {
        return field.to_string();
    }
    let mut chars = field.chars();
    let capitalized: String = chars
        .next()
        .map(|c| c.to_ascii_uppercase())
        .into_iter()
        .chain(chars)
        .collect();
    format!("legacy{capitalized}")
}

/// Key under which `value` can be kept in `map` without overwriting anything
///
/// Tries `base`, then `base2`, `base3` and so on. Returns `None` when one of
/// those keys already holds an equal value, so nothing needs writing.
pub(crate) fn free_slot(map: &Map<String, Value>, base: &str, value: &Value) -> Option<String> {
    let mut key = base.to_string();
    let mut n = 1usize;
    loop {
        match map.get(&key) {
            None => return Some(key),
            Some(existing) if existing == value => return None,
            Some(_) => {
                n += 1;
                key = format!("{base}{n}");
            }
        }
    }
}
