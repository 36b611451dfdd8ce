//! Dotted-path resolution into value trees.

use serde_json::Value;

use super::Props;

/// First segment of a dotted path (`"mainObj.passedProp"` → `"mainObj"`).
pub fn path_head(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

/// Resolve a dotted path inside a props bag.
///
/// Object segments are looked up by key, array segments by index. Returns
/// `None` as soon as a segment is missing; `null` leaves are found values.
pub fn get_path<'a>(root: &'a Props, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = root.get(first)?;
    for segment in segments {
        current = step(current, segment)?;
    }
    Some(current)
}

/// Resolve a dotted path inside an arbitrary value tree.
pub fn get_value_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = step(current, segment)?;
    }
    Some(current)
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}
