//! Deep `extend` merging for inherited definitions and data defaults.

use serde_json::Value;

use super::Props;

/// Deep-merge `over` onto `base`.
///
/// Objects merge key by key, recursively. Any other pairing (arrays
/// included) takes the override wholesale.
pub fn extend(base: &Value, over: &Value) -> Value {
    match (base, over) {
        (Value::Object(b), Value::Object(o)) => Value::Object(extend_map(b, o)),
        _ => over.clone(),
    }
}

/// [`extend`] for two props bags.
pub fn extend_map(base: &Props, over: &Props) -> Props {
    let mut merged = base.clone();
    for (key, value) in over {
        let next = match merged.get(key) {
            Some(existing) => extend(existing, value),
            None => value.clone(),
        };
        merged.insert(key.clone(), next);
    }
    merged
}
