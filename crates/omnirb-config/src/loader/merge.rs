//! Deep merge for layered settings.

use serde_json::{Map, Value};

/// Merge overlay values into the base, recursively overriding hashes.
pub(super) fn merge_values(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            merge_maps(base_map, overlay_map);
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

/// Merge every key of `overlay` into `base`.
pub(super) fn merge_maps(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match base.get_mut(key) {
            Some(existing) => merge_values(existing, value),
            None => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}
