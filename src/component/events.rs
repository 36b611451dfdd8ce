//! Declared events: binding listeners to the root or selector matches.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::json;

use super::context::call_method;
use super::instance::EventBinding;
use crate::dom::{DomEvent, Listener};
use crate::error::Diagnostic;
use crate::registry::InstanceId;
use crate::scope::{Scope, ScopeState};

fn listener(scope: &Scope, instance: InstanceId, handler: String) -> Listener {
    let weak = scope.downgrade();
    Rc::new(move |event: &DomEvent| {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let scope = Scope { inner };
        let payload = json!({"type": event.name, "detail": event.detail});
        call_method(&scope, instance, &handler, &[payload]);
    })
}

impl Scope {
    /// Bind every declared event of `instance`, unbinding first.
    ///
    /// A missing handler or target is reported and that event is skipped.
    pub(crate) fn bind_events(&self, instance: InstanceId) {
        self.unbind_events(instance);
        let Some(definition) = self.definition_of(instance) else {
            return;
        };
        let mut diagnostics = Vec::new();
        {
            let mut state = self.state_mut();
            let ScopeState {
                document, registry, ..
            } = &mut *state;
            let Some(inst) = registry.get_mut(instance) else {
                return;
            };
            let mut bindings = BTreeMap::new();
            for spec in &definition.view.events {
                if inst.state.method(&spec.handler).is_none() {
                    diagnostics.push(Diagnostic::MissingHandler {
                        component: inst.identifier.clone(),
                        handler: spec.handler.clone(),
                    });
                    continue;
                }
                let targets = match &spec.selector {
                    None if document.contains(inst.element) => vec![inst.element],
                    None => Vec::new(),
                    Some(selector) => match document.query_selector_all(inst.element, selector) {
                        Ok(found) => found,
                        Err(err) => {
                            diagnostics.push(Diagnostic::InvalidSelector {
                                component: inst.identifier.clone(),
                                selector: selector.clone(),
                                reason: err.to_string(),
                            });
                            continue;
                        }
                    },
                };
                if targets.is_empty() {
                    diagnostics.push(Diagnostic::MissingTarget {
                        component: inst.identifier.clone(),
                        selector: spec.selector.clone(),
                        event: spec.event.clone(),
                        binding: true,
                    });
                    continue;
                }
                let listeners = targets
                    .into_iter()
                    .filter_map(|target| {
                        let callback = listener(self, instance, spec.handler.clone());
                        document
                            .add_event_listener(target, spec.event.clone(), callback)
                            .map(|id| (target, id))
                    })
                    .collect();
                bindings.insert(
                    spec.key(),
                    EventBinding {
                        selector: spec.selector.clone(),
                        event: spec.event.clone(),
                        listeners,
                    },
                );
            }
            inst.bindings = bindings;
            inst.events_bound = true;
        }
        for diagnostic in diagnostics {
            self.report(diagnostic);
        }
    }

    /// Remove exactly the listeners `bind_events` added.
    ///
    /// A binding whose listeners are all gone and whose target no longer
    /// exists is reported as a missing target.
    pub(crate) fn unbind_events(&self, instance: InstanceId) {
        let mut diagnostics = Vec::new();
        {
            let mut state = self.state_mut();
            let ScopeState {
                document, registry, ..
            } = &mut *state;
            let Some(inst) = registry.get_mut(instance) else {
                return;
            };
            inst.events_bound = false;
            for binding in std::mem::take(&mut inst.bindings).into_values() {
                let mut removed = 0;
                for &(_, id) in &binding.listeners {
                    if document.remove_event_listener(id) {
                        removed += 1;
                    }
                }
                if removed > 0 {
                    continue;
                }
                let target_exists = document.contains(inst.element)
                    && match &binding.selector {
                        None => true,
                        Some(selector) => document
                            .query_selector_all(inst.element, selector)
                            .is_ok_and(|found| !found.is_empty()),
                    };
                if !target_exists {
                    diagnostics.push(Diagnostic::MissingTarget {
                        component: inst.identifier.clone(),
                        selector: binding.selector,
                        event: binding.event,
                        binding: false,
                    });
                }
            }
        }
        for diagnostic in diagnostics {
            self.report(diagnostic);
        }
    }
}
