//! ComponentRegistry: the tree of component instances.
//!
//! Instances live in a `SlotMap`; parent/child relations are kept in
//! secondary maps so the registry can be walked in both directions without
//! any instance owning another. Two indexes resolve an instance by its
//! identifier (tag ids) and by the element it is currently bound to.

use std::collections::HashMap;

use slotmap::{new_key_type, SecondaryMap, SlotMap};

use crate::component::ComponentInstance;
use crate::dom::ElementId;

new_key_type! {
    /// Unique identifier for a component instance.
    pub struct InstanceId;
}

const EMPTY_CHILDREN: &[InstanceId] = &[];

/// Every instance of one scope, active or waiting for a resume.
#[derive(Default)]
pub struct ComponentRegistry {
    instances: SlotMap<InstanceId, ComponentInstance>,
    parent: SecondaryMap<InstanceId, InstanceId>,
    children: SecondaryMap<InstanceId, Vec<InstanceId>>,
    by_identifier: HashMap<String, InstanceId>,
    by_element: HashMap<ElementId, InstanceId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an instance under `parent` (or as a root) and index it.
    pub fn insert(&mut self, instance: ComponentInstance, parent: Option<InstanceId>) -> InstanceId {
        let identifier = instance.identifier.clone();
        let element = instance.element;
        let id = self.instances.insert(instance);
        self.children.insert(id, Vec::new());
        self.by_identifier.insert(identifier, id);
        self.by_element.insert(element, id);
        self.set_parent(id, parent);
        id
    }

    /// Remove an instance. Its children become roots.
    pub fn remove(&mut self, id: InstanceId) -> Option<ComponentInstance> {
        let instance = self.instances.remove(id)?;
        self.set_parent_link(id, None);
        if let Some(kids) = self.children.remove(id) {
            for kid in kids {
                self.parent.remove(kid);
            }
        }
        if self.by_identifier.get(&instance.identifier) == Some(&id) {
            self.by_identifier.remove(&instance.identifier);
        }
        if self.by_element.get(&instance.element) == Some(&id) {
            self.by_element.remove(&instance.element);
        }
        Some(instance)
    }

    /// Move `id` under `parent`, detaching it from its previous parent.
    pub fn set_parent(&mut self, id: InstanceId, parent: Option<InstanceId>) {
        if !self.instances.contains_key(id) {
            return;
        }
        let parent = parent.filter(|&p| p != id && self.instances.contains_key(p));
        self.set_parent_link(id, parent);
    }

    fn set_parent_link(&mut self, id: InstanceId, parent: Option<InstanceId>) {
        if let Some(old) = self.parent.remove(id) {
            if let Some(siblings) = self.children.get_mut(old) {
                siblings.retain(|&c| c != id);
            }
        }
        if let Some(parent) = parent {
            self.parent.insert(id, parent);
            if let Some(siblings) = self.children.get_mut(parent) {
                siblings.push(id);
            }
        }
    }

    pub fn parent(&self, id: InstanceId) -> Option<InstanceId> {
        self.parent.get(id).copied()
    }

    /// Children in attachment order.
    pub fn children(&self, id: InstanceId) -> &[InstanceId] {
        self.children
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_CHILDREN)
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, id: InstanceId) -> Vec<InstanceId> {
        let mut out = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            out.push(parent);
            current = parent;
        }
        out
    }

    pub fn get(&self, id: InstanceId) -> Option<&ComponentInstance> {
        self.instances.get(id)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut ComponentInstance> {
        self.instances.get_mut(id)
    }

    pub fn by_identifier(&self, identifier: &str) -> Option<InstanceId> {
        self.by_identifier.get(identifier).copied()
    }

    pub fn by_element(&self, element: ElementId) -> Option<InstanceId> {
        self.by_element.get(&element).copied()
    }

    /// Bind `id` to `element`, replacing its previous element.
    pub fn attach_element(&mut self, id: InstanceId, element: ElementId) {
        let Some(instance) = self.instances.get_mut(id) else {
            return;
        };
        let old = std::mem::replace(&mut instance.element, element);
        if self.by_element.get(&old) == Some(&id) {
            self.by_element.remove(&old);
        }
        self.by_element.insert(element, id);
    }

    /// Forget the element binding of `id` without touching the instance.
    pub fn detach_element(&mut self, id: InstanceId) {
        if let Some(instance) = self.instances.get(id) {
            if self.by_element.get(&instance.element) == Some(&id) {
                self.by_element.remove(&instance.element);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &ComponentInstance)> {
        self.instances.iter()
    }
}
