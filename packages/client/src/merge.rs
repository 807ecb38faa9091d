//! Nested state merging.
//!
//! Both operations refuse to create keys and refuse to swap a container for a
//! value of another shape. Observers of the state tree track the fields that
//! existed when it was built, so a write to any other location is a bug that
//! must surface immediately.

use serde_json::Value;

use crate::error::StateError;

/// Set a value at `keys` inside `root`.
///
/// Every intermediate segment must resolve to an existing value and the final
/// segment must already be a key of its parent record.
pub fn nested_set(root: &mut Value, keys: &[&str], value: Value) -> Result<(), StateError> {
    let Some((last, parents)) = keys.split_last() else {
        return Err(StateError::MissingKey(String::new()));
    };

    let mut container = root;
    for key in parents {
        container = container
            .get_mut(*key)
            .ok_or_else(|| StateError::MissingKey((*key).to_string()))?;
    }

    match container.as_object_mut() {
        Some(record) if record.contains_key(*last) => {
            record.insert((*last).to_string(), value);
            Ok(())
        }
        _ => Err(StateError::MissingKey((*last).to_string())),
    }
}

/// Deep-merge `update` into `base`.
///
/// Records are merged key by key, sequences and scalars are replaced. On error
/// `base` is left exactly as it was.
pub fn nested_update(base: &mut Value, update: &Value) -> Result<(), StateError> {
    let mut candidate = base.clone();
    merge_into(&mut candidate, update, "")?;
    *base = candidate;
    Ok(())
}

fn merge_into(base: &mut Value, update: &Value, path: &str) -> Result<(), StateError> {
    let (Some(base), Some(update)) = (base.as_object_mut(), update.as_object()) else {
        return Err(StateError::InvalidValue {
            path: path.to_string(),
            reason: "both sides of a merge must be records".to_string(),
        });
    };

    for (key, new_val) in update {
        let old_val = base
            .get_mut(key)
            .ok_or_else(|| StateError::MissingKey(key.clone()))?;

        if old_val == new_val {
            continue;
        }

        if is_container(old_val) && shape(old_val) != shape(new_val) {
            return Err(StateError::StructureChanged(key.clone()));
        }

        if old_val.is_object() {
            merge_into(old_val, new_val, key)?;
        } else {
            *old_val = new_val.clone();
        }
    }

    Ok(())
}

fn is_container(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

fn shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
