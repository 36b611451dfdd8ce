//! Value trees: dotted-path lookup and `extend` merging.
//!
//! All component, data and tag state is carried as [`serde_json::Value`]
//! trees. Values are owned, so every read hands out a fresh clone and no
//! caller can mutate a snapshot held by the engine.
//!
//! - [`get_path`]: resolve `"mainObj.passedProp"` inside a props map.
//! - [`extend`]: deep-merge an override tree onto a base tree.

pub mod merge;
pub mod path;

pub use merge::{extend, extend_map};
pub use path::{get_path, get_value_path, path_head};

/// A props bag: prop name → value.
pub type Props = serde_json::Map<String, serde_json::Value>;

/// Turn any value into a props bag.
///
/// Objects are taken as-is; `null` becomes an empty bag. Any other value is
/// not a valid patch and yields `None`.
pub fn into_props(value: serde_json::Value) -> Option<Props> {
    match value {
        serde_json::Value::Object(map) => Some(map),
        serde_json::Value::Null => Some(Props::new()),
        _ => None,
    }
}
