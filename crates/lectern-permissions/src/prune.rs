//! Recursive empty-branch removal for raw JSON documents.
//!
//! Stored permission documents are pruned before they are parsed so that
//! legacy rows carrying empty intermediate objects (e.g. `{"2024-25": {}}`)
//! load as the empty document instead of failing typed parsing.

use serde_json::Value;

/// Removes every object member whose value is (or becomes) an empty object.
///
/// Recurses into object values and array elements. Array elements are never
/// removed, only pruned in place. Returns `true` if anything was removed.
pub fn prune_value(value: &mut Value) -> bool {
    match value {
        Value::Object(map) => {
            let mut removed = false;
            let keys: Vec<String> = map.keys().cloned().collect();
            for key in keys {
                let Some(child) = map.get_mut(&key) else {
                    continue;
                };
                match child {
                    Value::Object(_) => {
                        removed |= prune_value(child);
                        if child.as_object().is_some_and(|m| m.is_empty()) {
                            map.remove(&key);
                            removed = true;
                        }
                    }
                    Value::Array(_) => removed |= prune_value(child),
                    _ => {}
                }
            }
            removed
        }
        Value::Array(items) => {
            let mut removed = false;
            for item in items.iter_mut() {
                removed |= prune_value(item);
            }
            removed
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prune_removes_nested_empty_objects() {
        let mut doc = json!({
            "2024-25": {"5": {"DEPT_1": {}}},
            "2023-24": {"3": {"DEPT_2": {"B1": {"mooc": {"read": true}}}}}
        });

        assert!(prune_value(&mut doc));
        assert_eq!(
            doc,
            json!({"2023-24": {"3": {"DEPT_2": {"B1": {"mooc": {"read": true}}}}}})
        );
    }

    #[test]
    fn test_prune_recurses_into_arrays_without_dropping_elements() {
        let mut doc = json!({"list": [{"a": {}}, {}, 3]});

        prune_value(&mut doc);
        assert_eq!(doc, json!({"list": [{}, {}, 3]}));
    }

    #[test]
    fn test_prune_is_idempotent() {
        let mut doc = json!({"a": {"b": {}}, "c": {"d": {"e": 1}, "f": {}}});

        prune_value(&mut doc);
        let once = doc.clone();
        assert!(!prune_value(&mut doc));
        assert_eq!(doc, once);
    }

    #[test]
    fn test_prune_keeps_scalars_and_non_empty_branches() {
        let mut doc = json!({"x": false, "y": 0, "z": "", "w": []});
        assert!(!prune_value(&mut doc));
        assert_eq!(doc, json!({"x": false, "y": 0, "z": "", "w": []}));
    }
}
