//! Error types.
//!
//! [`ScopeError`] is returned from API calls that cannot proceed. A
//! [`Diagnostic`] is a locally recovered problem: it is logged through
//! [`crate::logs`], recorded on the scope, and the engine carries on.

use serde_json::Value;

use crate::logs::{self, LogMessage};

/// Errors returned by scope-level API calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("a definition with id `{0}` already exists in this scope")]
    DuplicateDefinition(String),
    #[error("definition `{0}` belongs to a different scope")]
    ForeignDefinition(String),
    #[error("extend chain of `{id}` is deeper than {max}")]
    ExtendDepthExceeded { id: String, max: usize },
    #[error("element does not exist in the document")]
    UnknownElement,
    #[error("the scope has been dropped")]
    ScopeDropped,
}

/// A recovered problem, reported once and otherwise ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// An event declaration matched no element.
    MissingTarget {
        component: String,
        selector: Option<String>,
        event: String,
        binding: bool,
    },
    /// A method or event handler name resolved to nothing.
    MissingHandler { component: String, handler: String },
    /// A dotted path did not resolve; `snapshot` is the data searched.
    MissingProp {
        owner: String,
        path: String,
        snapshot: Value,
    },
    /// A prop was declared in more than one partition.
    PartitionConflict {
        component: String,
        name: String,
        kept: &'static str,
        dropped: &'static str,
    },
    /// A local write targeted a prop owned by another partition.
    ForeignWrite {
        component: String,
        name: String,
        partition: &'static str,
    },
    UnknownData { owner: String, data: String },
    UnknownModifier { owner: String, modifier: String },
    /// A component element carried an identifier no tag was rendered for.
    UnknownTag { identifier: String },
    /// An active instance was connected to a second element.
    DuplicateMount { identifier: String },
    InvalidSelector {
        component: String,
        selector: String,
        reason: String,
    },
    /// A flush hit its job limit; the remaining queue was dropped.
    RunawayFlush { limit: usize, dropped: usize },
}

impl Diagnostic {
    /// The structured log form of this diagnostic.
    pub fn to_log(&self) -> LogMessage {
        match self {
            Self::MissingTarget {
                component,
                selector,
                event,
                binding,
            } => {
                let title = if *binding {
                    "Could Not Find An Element For Binding An Event To"
                } else {
                    "Could Not Find An Element For Unbinding An Event From"
                };
                LogMessage::new(title)
                    .field("component", component)
                    .field("selector", selector.as_deref().unwrap_or("<root>"))
                    .field("event", event)
            }
            Self::MissingHandler { component, handler } => {
                LogMessage::new("Could Not Find The Specified Handler")
                    .field("component", component)
                    .field("handler", handler)
            }
            Self::MissingProp {
                owner,
                path,
                snapshot,
            } => LogMessage::new("Could Not Find a Requested Property")
                .field("owner", owner)
                .field("properties path", path)
                .field("data (snapshot)", snapshot),
            Self::PartitionConflict {
                component,
                name,
                kept,
                dropped,
            } => LogMessage::new("Property Declared In More Than One Partition")
                .field("component", component)
                .field("property", name)
                .field("kept", kept)
                .field("dropped", dropped),
            Self::ForeignWrite {
                component,
                name,
                partition,
            } => LogMessage::new("Local Write To A Non-Local Property Was Rejected")
                .field("component", component)
                .field("property", name)
                .field("owned by", partition),
            Self::UnknownData { owner, data } => LogMessage::new("Could Not Find Data")
                .field("owner", owner)
                .field("data id", data),
            Self::UnknownModifier { owner, modifier } => {
                LogMessage::new("Could Not Find Modifier")
                    .field("owner", owner)
                    .field("modifier id", modifier)
            }
            Self::UnknownTag { identifier } => {
                LogMessage::new("No Tag Was Rendered For A Component Element")
                    .field("identifier", identifier)
            }
            Self::DuplicateMount { identifier } => {
                LogMessage::new("Component Is Already Mounted Elsewhere")
                    .field("identifier", identifier)
            }
            Self::InvalidSelector {
                component,
                selector,
                reason,
            } => LogMessage::new("Invalid Event Selector")
                .field("component", component)
                .field("selector", selector)
                .field("reason", reason),
            Self::RunawayFlush { limit, dropped } => {
                LogMessage::new("Sequence Queue Did Not Settle")
                    .field("job limit", limit)
                    .field("dropped jobs", dropped)
            }
        }
    }
}

/// Diagnostics recorded on a scope.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Log and record.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        logs::print(&diagnostic.to_log());
        self.entries.push(diagnostic);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scope_error_messages() {
        assert_eq!(
            ScopeError::DuplicateDefinition("row".into()).to_string(),
            "a definition with id `row` already exists in this scope"
        );
        assert_eq!(
            ScopeError::ExtendDepthExceeded {
                id: "leaf".into(),
                max: 2
            }
            .to_string(),
            "extend chain of `leaf` is deeper than 2"
        );
    }

    #[test]
    fn missing_prop_log_carries_snapshot() {
        let log = Diagnostic::MissingProp {
            owner: "globals".into(),
            path: "a.b".into(),
            snapshot: json!({"a": 1}),
        }
        .to_log();
        insta::assert_snapshot!(log.to_string(), @r#"
        Could Not Find a Requested Property
          owner:
            globals
          properties path:
            a.b
          data (snapshot):
            {"a":1}
        "#);
    }

    #[test]
    fn report_records_in_order() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.report(Diagnostic::UnknownTag {
            identifier: "x".into(),
        });
        diagnostics.report(Diagnostic::DuplicateMount {
            identifier: "y".into(),
        });
        assert_eq!(diagnostics.entries().len(), 2);
        let taken = diagnostics.take();
        assert!(matches!(taken[0], Diagnostic::UnknownTag { .. }));
        assert!(diagnostics.entries().is_empty());
    }
}
