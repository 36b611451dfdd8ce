//! Prop table entries.

use serde_json::Value;

/// The partition a prop belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropSource {
    /// Owned by the component, written with `set_props`.
    Local,
    /// Supplied by the tag.
    External,
    /// A dotted path into the parent's props.
    Referenced { path: String },
    /// A key path inside a Data entry.
    Global { data: String, key: String },
}

impl PropSource {
    pub fn partition(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::External => "external",
            Self::Referenced { .. } => "referenced",
            Self::Global { .. } => "global",
        }
    }
}

/// One prop of an instance. `None` is an undefined value.
#[derive(Debug, Clone, PartialEq)]
pub struct PropSlot {
    pub source: PropSource,
    pub value: Option<Value>,
}

impl PropSlot {
    pub fn new(source: PropSource, value: Option<Value>) -> Self {
        Self { source, value }
    }
}
