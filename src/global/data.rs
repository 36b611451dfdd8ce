//! Data: a named value tree shared across components.

use serde_json::Value;

use crate::change::{set_changes, ChangeSet};
use crate::scope::DataHandle;
use crate::value::{get_path, into_props, Props};

/// Declaration of a Data entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DataDefinition {
    pub id: String,
    pub(crate) extend: Option<(u64, String)>,
    /// Initial value. Anything but an object starts out empty.
    pub defaults: Value,
}

impl DataDefinition {
    pub fn new(id: impl Into<String>, defaults: Value) -> Self {
        Self {
            id: id.into(),
            extend: None,
            defaults,
        }
    }

    /// Start from `parent`'s current value, deep-merged with these defaults.
    pub fn extend(mut self, parent: &DataHandle) -> Self {
        self.extend = Some((parent.scope_id(), parent.id().to_owned()));
        self
    }

    pub(crate) fn default_props(&self) -> Props {
        into_props(self.defaults.clone()).unwrap_or_default()
    }
}

/// A live Data entry.
#[derive(Debug, Clone)]
pub struct DataEntry {
    pub(crate) definition: DataDefinition,
    pub(crate) value: Props,
}

impl DataEntry {
    pub(crate) fn new(definition: DataDefinition, value: Props) -> Self {
        Self { definition, value }
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn value(&self) -> &Props {
        &self.value
    }

    /// Clone of the value at `path`, or `None` when a segment is missing.
    pub fn get_prop(&self, path: &str) -> Option<Value> {
        get_path(&self.value, path).cloned()
    }

    /// Merge `patch` into the value and report what changed.
    pub(crate) fn set_props(&mut self, patch: &Props) -> ChangeSet {
        set_changes(&mut self.value, patch, true)
    }
}
