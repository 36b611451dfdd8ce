//! Extend-chain arena and resolution.
//!
//! Each registered definition is stored twice: `proto` exactly as declared,
//! and `resolved` with its whole parent chain merged in. Resolution happens
//! once, at registration, because a parent always exists before its child.
//!
//! Merge rules, child over parent:
//! - local and external prop defaults deep-merge ([`crate::value::extend_map`]);
//! - a prop name moves to the partition the child declares it in;
//! - methods, hooks, `change` and `render` are replaced by name;
//! - events are unioned by `selector:event:handler`.

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};

use super::{ComponentDefinition, PropSpecs};
use crate::error::ScopeError;
use crate::value::extend_map;

new_key_type! {
    /// Handle to a definition in a scope's arena.
    pub struct DefinitionKey;
}

/// A prop declared in two partitions; `kept` won.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub name: String,
    pub kept: &'static str,
    pub dropped: &'static str,
}

struct DefinitionEntry {
    proto: Rc<ComponentDefinition>,
    resolved: Rc<ComponentDefinition>,
    depth: usize,
}

/// All component definitions of one scope.
#[derive(Default)]
pub struct DefinitionArena {
    entries: SlotMap<DefinitionKey, DefinitionEntry>,
    by_id: HashMap<String, DefinitionKey>,
}

impl DefinitionArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, resolving it against its parent. Returns the
    /// key, the stored declared form and any partition conflicts.
    ///
    /// The caller has already checked that `extend` points into this scope.
    pub fn insert(
        &mut self,
        definition: ComponentDefinition,
        max_depth: usize,
    ) -> Result<(DefinitionKey, Rc<ComponentDefinition>, Vec<Conflict>), ScopeError> {
        if self.by_id.contains_key(&definition.id) {
            return Err(ScopeError::DuplicateDefinition(definition.id));
        }

        let (resolved, depth, conflicts) = match definition.extend {
            Some(parent_ref) => {
                let parent = self
                    .entries
                    .get(parent_ref.key)
                    .ok_or_else(|| ScopeError::ForeignDefinition(definition.id.clone()))?;
                let depth = parent.depth + 1;
                if depth > max_depth {
                    return Err(ScopeError::ExtendDepthExceeded {
                        id: definition.id,
                        max: max_depth,
                    });
                }
                let (resolved, conflicts) = resolve(&parent.resolved, &definition);
                (resolved, depth, conflicts)
            }
            None => {
                let mut resolved = definition.clone();
                let conflicts = normalize(&mut resolved.state.props);
                (resolved, 1, conflicts)
            }
        };

        let id = definition.id.clone();
        let proto = Rc::new(definition);
        let key = self.entries.insert(DefinitionEntry {
            proto: Rc::clone(&proto),
            resolved: Rc::new(resolved),
            depth,
        });
        self.by_id.insert(id, key);
        Ok((key, proto, conflicts))
    }

    /// The definition as declared.
    pub fn proto(&self, key: DefinitionKey) -> Option<Rc<ComponentDefinition>> {
        self.entries.get(key).map(|e| Rc::clone(&e.proto))
    }

    /// The definition with its extend chain merged.
    pub fn resolved(&self, key: DefinitionKey) -> Option<Rc<ComponentDefinition>> {
        self.entries.get(key).map(|e| Rc::clone(&e.resolved))
    }

    pub fn key_of(&self, id: &str) -> Option<DefinitionKey> {
        self.by_id.get(id).copied()
    }

    pub fn depth(&self, key: DefinitionKey) -> Option<usize> {
        self.entries.get(key).map(|e| e.depth)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Within one layer a name keeps exactly one partition: global, then
/// external, then local.
fn normalize(props: &mut PropSpecs) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for name in props.global.keys() {
        if props.external.remove(name).is_some() {
            conflicts.push(conflict(name, "global", "external"));
        }
        if props.local.remove(name).is_some() {
            conflicts.push(conflict(name, "global", "local"));
        }
    }
    let external: Vec<String> = props.external.keys().cloned().collect();
    for name in external {
        if props.local.remove(&name).is_some() {
            conflicts.push(conflict(&name, "external", "local"));
        }
    }
    conflicts
}

fn conflict(name: &str, kept: &'static str, dropped: &'static str) -> Conflict {
    Conflict {
        name: name.to_owned(),
        kept,
        dropped,
    }
}

/// Merge `child` over an already resolved `parent`.
pub fn resolve(
    parent: &ComponentDefinition,
    child: &ComponentDefinition,
) -> (ComponentDefinition, Vec<Conflict>) {
    let mut child_props = child.state.props.clone();
    let mut conflicts = normalize(&mut child_props);

    // Names the child places in one partition leave the parent's others.
    let mut props = parent.state.props.clone();
    for name in child_props.local.keys() {
        if props.global.remove(name).is_some() {
            conflicts.push(conflict(name, "local", "global"));
        }
        if props.external.remove(name).is_some() {
            conflicts.push(conflict(name, "local", "external"));
        }
    }
    for name in child_props.external.keys() {
        if props.global.remove(name).is_some() {
            conflicts.push(conflict(name, "external", "global"));
        }
        if props.local.remove(name).is_some() {
            conflicts.push(conflict(name, "external", "local"));
        }
    }
    for name in child_props.global.keys() {
        if props.local.remove(name).is_some() {
            conflicts.push(conflict(name, "global", "local"));
        }
        if props.external.remove(name).is_some() {
            conflicts.push(conflict(name, "global", "external"));
        }
    }
    props.local = extend_map(&props.local, &child_props.local);
    props.external = extend_map(&props.external, &child_props.external);
    props.global.extend(child_props.global);

    let mut methods = parent.state.methods.clone();
    for (name, method) in &child.state.methods.local {
        methods.global.remove(name);
        methods.local.insert(name.clone(), Rc::clone(method));
    }
    for (name, method) in &child.state.methods.global {
        methods.local.remove(name);
        methods.global.insert(name.clone(), method.clone());
    }

    let mut state_hooks = parent.state.hooks.clone();
    state_hooks.extend(child.state.hooks.iter().map(|(k, v)| (*k, Rc::clone(v))));
    let mut view_hooks = parent.view.hooks.clone();
    view_hooks.extend(child.view.hooks.iter().map(|(k, v)| (*k, Rc::clone(v))));

    let mut events = parent.view.events.clone();
    let mut seen: BTreeSet<String> = events.iter().map(|e| e.key()).collect();
    for event in &child.view.events {
        if seen.insert(event.key()) {
            events.push(event.clone());
        }
    }

    let mut resolved = child.clone();
    resolved.state.props = props;
    resolved.state.methods = methods;
    resolved.state.hooks = state_hooks;
    resolved.state.change = child.state.change.clone().or_else(|| parent.state.change.clone());
    resolved.view.render = child.view.render.clone().or_else(|| parent.view.render.clone());
    resolved.view.hooks = view_hooks;
    resolved.view.events = events;
    (resolved, conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Hook, Layer};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn parent() -> ComponentDefinition {
        ComponentDefinition::new("parent")
            .local_prop("number", json!(0))
            .local_prop("text", json!(""))
            .local_prop("config", json!({"a": 0, "b": 2}))
            .global_prop("num", "globals", "number")
            .local_method("printNumber", |_, _| json!("parent-number"))
            .local_method("printText", |_, _| json!("parent-text"))
            .on(Hook::Mount, |_, _| {})
            .render(|_, _| Some("parent".into()))
            .event("click", "printText")
    }

    #[test]
    fn child_inherits_and_overrides() {
        let child = ComponentDefinition::new("child")
            .local_prop("array", json!([]))
            .local_prop("config", json!({"a": 1}))
            .local_method("printText", |_, _| json!("child-text"))
            .event("click", "printText")
            .event_on("input", ".f", "printNumber");
        let (resolved, conflicts) = resolve(&parent(), &child);
        assert!(conflicts.is_empty());
        assert_eq!(resolved.id, "child");
        assert_eq!(
            Value::Object(resolved.state.props.local.clone()),
            json!({"number": 0, "text": "", "config": {"a": 1, "b": 2}, "array": []})
        );
        assert!(resolved.state.props.global.contains_key("num"));
        assert!(resolved.hook(Layer::State, Hook::Mount).is_some());
        assert!(resolved.render_fn().is_some());
        assert_eq!(resolved.view.events.len(), 2);
        assert!(resolved.method("printNumber").is_some());
    }

    #[test]
    fn child_partition_wins() {
        let child = ComponentDefinition::new("child").local_prop("num", json!(1));
        let (resolved, conflicts) = resolve(&parent(), &child);
        assert!(!resolved.state.props.global.contains_key("num"));
        assert_eq!(resolved.state.props.local["num"], json!(1));
        assert_eq!(conflicts, vec![conflict("num", "local", "global")]);
    }

    #[test]
    fn same_layer_conflict_prefers_global() {
        let mut arena = DefinitionArena::new();
        let def = ComponentDefinition::new("solo")
            .local_prop("x", json!(1))
            .global_prop("x", "d", "x");
        let (key, _, conflicts) = arena.insert(def, 4).unwrap();
        assert_eq!(conflicts, vec![conflict("x", "global", "local")]);
        let resolved = arena.resolved(key).unwrap();
        assert!(resolved.state.props.local.is_empty());
        // The declared form is untouched.
        assert_eq!(arena.proto(key).unwrap().state.props.local["x"], json!(1));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut arena = DefinitionArena::new();
        arena.insert(ComponentDefinition::new("a"), 4).unwrap();
        assert_eq!(
            arena.insert(ComponentDefinition::new("a"), 4).unwrap_err(),
            ScopeError::DuplicateDefinition("a".into())
        );
    }

    #[test]
    fn depth_is_capped() {
        let mut arena = DefinitionArena::new();
        let (root, _, _) = arena.insert(ComponentDefinition::new("root"), 2).unwrap();
        let mut mid = ComponentDefinition::new("mid");
        mid.extend = Some(super::super::DefinitionRef {
            scope_id: 0,
            key: root,
        });
        let (mid_key, _, _) = arena.insert(mid, 2).unwrap();
        assert_eq!(arena.depth(mid_key), Some(2));

        let mut leaf = ComponentDefinition::new("leaf");
        leaf.extend = Some(super::super::DefinitionRef {
            scope_id: 0,
            key: mid_key,
        });
        assert_eq!(
            arena.insert(leaf, 2).unwrap_err(),
            ScopeError::ExtendDepthExceeded {
                id: "leaf".into(),
                max: 2
            }
        );
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.key_of("mid"), Some(mid_key));
    }
}
