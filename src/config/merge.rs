//! Deep union of configuration trees.

use serde_json::{Map, Value};

/// Merges `incoming` into `existing`.
///
/// Objects are merged key by key and arrays index by index, recursively.
/// Whenever either side is not a composite of the same kind, `incoming`
/// replaces `existing`. Keys only present in `incoming` are appended in the
/// order they appear there.
pub fn merge(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(base), Value::Object(overlay)) => merge_maps(base, overlay),
        (Value::Array(base), Value::Array(overlay)) => {
            for (index, value) in overlay.into_iter().enumerate() {
                match base.get_mut(index) {
                    Some(slot) => merge(slot, value),
                    None => base.push(value),
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Merges two object trees; see [`merge`].
pub fn merge_maps(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match base.get_mut(&key) {
            Some(slot) => merge(slot, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}
