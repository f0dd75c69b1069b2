//! Helpers for reading and writing nested JSON objects.

use beacon_domain::{BeaconError, JsonObject, Result};
use serde_json::Value;
use tracing::debug;

/// Value at `index` inside `document`.
///
/// Returns a clone of the whole document for an empty index, and `None`
/// when any segment of the path is missing or not an object.
pub fn get_value(document: &JsonObject, index: &[&str]) -> Option<Value> {
    let Some((first, rest)) = index.split_first() else {
        return Some(Value::Object(document.clone()));
    };

    let mut target = document.get(*first)?;
    for key in rest {
        target = target.as_object()?.get(*key)?;
    }
    Some(target.clone())
}

/// Replace the value at `index` with `transform(current)`.
///
/// Intermediate segments that are missing or hold a non-object value are
/// replaced by empty objects.
///
/// # Errors
/// Returns `BeaconError::InvalidInput` if `index` is empty.
pub fn update_value<F>(document: &mut JsonObject, index: &[&str], transform: F) -> Result<()>
where
    F: FnOnce(Option<Value>) -> Value,
{
    let Some((last, parents)) = index.split_last() else {
        return Err(BeaconError::InvalidInput(
            "The index must contain at least one segment to update".into(),
        ));
    };

    let mut target = document;
    for key in parents {
        let slot = target
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(JsonObject::new()));
        if !slot.is_object() {
            *slot = Value::Object(JsonObject::new());
        }
        let Value::Object(map) = slot else {
            return Err(BeaconError::Internal(format!("Segment '{key}' is not an object")));
        };
        target = map;
    }

    let current = target.remove(*last);
    target.insert((*last).to_string(), transform(current));
    Ok(())
}

/// Remove the value at `index`. An empty index clears the document.
///
/// Returns whether something was removed. A path running through a
/// non-object value removes nothing.
pub fn delete_value(document: &mut JsonObject, index: &[&str]) -> bool {
    let Some((last, parents)) = index.split_last() else {
        let removed = !document.is_empty();
        document.clear();
        return removed;
    };

    let mut target = document;
    for key in parents {
        match target.get_mut(*key) {
            Some(Value::Object(map)) => target = map,
            _ => {
                debug!(index = ?index, "Attempted to delete an entry from an invalid index");
                return false;
            }
        }
    }
    target.remove(*last).is_some()
}
