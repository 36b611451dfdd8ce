//! ComponentInstance: one mounted occurrence of a definition.

use std::collections::BTreeMap;

use crate::definition::DefinitionKey;
use crate::dom::{ElementId, ListenerId};
use crate::sequence::Phase;
use crate::state::StateStore;
use crate::value::Props;

/// Listeners added for one declared event, keyed by `selector:event:handler`
/// in [`ComponentInstance::bindings`].
#[derive(Debug, Clone, PartialEq)]
pub struct EventBinding {
    pub selector: Option<String>,
    pub event: String,
    pub listeners: Vec<(ElementId, ListenerId)>,
}

/// One component occurrence bound to one element.
#[derive(Debug, Clone)]
pub struct ComponentInstance {
    pub identifier: String,
    pub definition: DefinitionKey,
    /// Whether the identifier came from `Tag::id`. Such instances survive a
    /// destroy and wait for a resume.
    pub explicit_id: bool,
    pub element: ElementId,
    pub active: bool,
    pub phase: Phase,
    /// HTML last applied by a render. `None` until the first render.
    pub current_html: Option<String>,
    /// Content the element carried when this instance was bound to it.
    pub original_html: String,
    pub state: StateStore,
    pub bindings: BTreeMap<String, EventBinding>,
    /// Whether declared events were bound since the last unbind.
    pub events_bound: bool,
    /// External props at the last destroy.
    pub prev_external: Option<Props>,
}

impl ComponentInstance {
    pub fn new(
        identifier: impl Into<String>,
        definition: DefinitionKey,
        explicit_id: bool,
        element: ElementId,
        original_html: String,
        state: StateStore,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            definition,
            explicit_id,
            element,
            active: false,
            phase: Phase::default(),
            current_html: None,
            original_html,
            state,
            bindings: BTreeMap::new(),
            events_bound: false,
            prev_external: None,
        }
    }

    /// Total listeners currently tracked by the identity map.
    pub fn listener_count(&self) -> usize {
        self.bindings.values().map(|b| b.listeners.len()).sum()
    }
}
