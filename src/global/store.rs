//! GlobalStore: Data entries, Modifiers and the subscriber table.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use super::data::{DataDefinition, DataEntry};
use super::modifier::{ModifierDefinition, ModifierFn};
use crate::error::ScopeError;
use crate::registry::InstanceId;
use crate::value::extend_map;

struct ModifierEntry {
    proto: Rc<ModifierDefinition>,
    methods: BTreeMap<String, ModifierFn>,
}

/// Why a modifier method lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    UnknownModifier,
    UnknownMethod,
}

/// Shared state of one scope.
#[derive(Default)]
pub struct GlobalStore {
    data: HashMap<String, DataEntry>,
    modifiers: HashMap<String, ModifierEntry>,
    /// Data id → subscribed instances, in subscription order.
    subscribers: HashMap<String, Vec<InstanceId>>,
}

impl GlobalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a Data entry. With `extend`, starts from the parent's
    /// current value deep-merged with the new defaults.
    pub fn insert_data(&mut self, definition: DataDefinition) -> Result<(), ScopeError> {
        if self.data.contains_key(&definition.id) {
            return Err(ScopeError::DuplicateDefinition(definition.id));
        }
        let value = match &definition.extend {
            Some((_, parent_id)) => {
                let parent = self
                    .data
                    .get(parent_id)
                    .ok_or_else(|| ScopeError::ForeignDefinition(definition.id.clone()))?;
                extend_map(parent.value(), &definition.default_props())
            }
            None => definition.default_props(),
        };
        self.data
            .insert(definition.id.clone(), DataEntry::new(definition, value));
        Ok(())
    }

    pub fn data(&self, id: &str) -> Option<&DataEntry> {
        self.data.get(id)
    }

    pub fn data_mut(&mut self, id: &str) -> Option<&mut DataEntry> {
        self.data.get_mut(id)
    }

    /// Register a Modifier and return its declared form.
    pub fn insert_modifier(
        &mut self,
        definition: ModifierDefinition,
    ) -> Result<Rc<ModifierDefinition>, ScopeError> {
        if self.modifiers.contains_key(&definition.id) {
            return Err(ScopeError::DuplicateDefinition(definition.id));
        }
        let mut methods = match &definition.extend {
            Some((_, parent_id)) => self
                .modifiers
                .get(parent_id)
                .map(|parent| parent.methods.clone())
                .ok_or_else(|| ScopeError::ForeignDefinition(definition.id.clone()))?,
            None => BTreeMap::new(),
        };
        methods.extend(
            definition
                .methods
                .iter()
                .map(|(name, f)| (name.clone(), Rc::clone(f))),
        );
        let proto = Rc::new(definition);
        self.modifiers.insert(
            proto.id.clone(),
            ModifierEntry {
                proto: Rc::clone(&proto),
                methods,
            },
        );
        Ok(proto)
    }

    pub fn modifier_proto(&self, id: &str) -> Option<Rc<ModifierDefinition>> {
        self.modifiers.get(id).map(|m| Rc::clone(&m.proto))
    }

    /// The live method `key` of modifier `id`, inherited methods included.
    pub fn modifier_method(&self, id: &str, key: &str) -> Result<ModifierFn, LookupError> {
        let entry = self.modifiers.get(id).ok_or(LookupError::UnknownModifier)?;
        entry
            .methods
            .get(key)
            .cloned()
            .ok_or(LookupError::UnknownMethod)
    }

    /// Route changes of `data` to `instance`. Idempotent.
    pub fn subscribe(&mut self, data: &str, instance: InstanceId) {
        let list = self.subscribers.entry(data.to_owned()).or_default();
        if !list.contains(&instance) {
            list.push(instance);
        }
    }

    /// Remove every route of `instance`.
    pub fn unsubscribe_all(&mut self, instance: InstanceId) {
        for list in self.subscribers.values_mut() {
            list.retain(|&i| i != instance);
        }
    }

    pub fn subscribers(&self, data: &str) -> Vec<InstanceId> {
        self.subscribers.get(data).cloned().unwrap_or_default()
    }
}
