//! Right-biased recursive merge of a local document onto a remote one.

use serde_json::{Map, Value};

/// Merges `local` on top of `remote` and returns the result.
///
/// For each key of `local`: if both sides hold an object the two are merged
/// recursively, otherwise the local value wins. Keys only present in `remote`
/// are kept. Arrays are values like any other, so a local `links` array
/// replaces the remote one instead of being combined with it.
///
/// # Examples
///
/// ```
/// use catsync_core::merge::merge;
/// use serde_json::json;
///
/// let remote = json!({"a": 1, "b": {"x": 1, "y": 2}});
/// let local = json!({"b": {"x": 9}, "c": 3});
///
/// let merged = merge(remote.as_object().unwrap(), local.as_object().unwrap());
/// assert_eq!(serde_json::Value::Object(merged), json!({"a": 1, "b": {"x": 9, "y": 2}, "c": 3}));
/// ```
pub fn merge(remote: &Map<String, Value>, local: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = remote.clone();
    for (key, value) in local {
        let next = match (merged.get(key), value) {
            (Some(Value::Object(base)), Value::Object(overlay)) => {
                Value::Object(merge(base, overlay))
            }
            _ => value.clone(),
        };
        merged.insert(key.clone(), next);
    }
    merged
}
