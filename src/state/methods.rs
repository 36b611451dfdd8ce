//! Method table entries.

use std::fmt;

use crate::definition::MethodFn;

/// Where a method comes from.
#[derive(Clone)]
pub enum MethodSource {
    /// Declared by the definition.
    Local(MethodFn),
    /// A closure handed over by the tag.
    External(MethodFn),
    /// A method of the parent instance, by name, resolved at call time.
    Referenced { name: String },
    /// A modifier method, resolved at call time.
    Global { modifier: String, key: String },
}

impl MethodSource {
    pub fn partition(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::External(_) => "external",
            Self::Referenced { .. } => "referenced",
            Self::Global { .. } => "global",
        }
    }
}

impl fmt::Debug for MethodSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(_) => f.write_str("Local(..)"),
            Self::External(_) => f.write_str("External(..)"),
            Self::Referenced { name } => f.debug_struct("Referenced").field("name", name).finish(),
            Self::Global { modifier, key } => f
                .debug_struct("Global")
                .field("modifier", modifier)
                .field("key", key)
                .finish(),
        }
    }
}

/// One method of an instance.
///
/// `shadowed` is the tag-supplied method a local method hides; the local
/// method reaches it through `Ctx::call_next`.
#[derive(Debug, Clone)]
pub struct MethodSlot {
    pub source: MethodSource,
    pub shadowed: Option<MethodSource>,
}

impl MethodSlot {
    pub fn new(source: MethodSource) -> Self {
        Self {
            source,
            shadowed: None,
        }
    }
}
