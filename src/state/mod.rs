//! Per-instance state: the prop and method tables.
//!
//! Every prop lives in exactly one partition ([`PropSource`]). Local props
//! change only through [`StateStore::set_local`]; referenced and global props
//! are re-resolved from their source; external props come from the tag.
//! Reads hand out clones, so nothing outside can mutate a stored value.

pub mod methods;
pub mod props;

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::change::{Change, ChangeSet};
use crate::definition::chain::Conflict;
use crate::definition::{ComponentDefinition, MethodFn};
use crate::global::GlobalStore;
use crate::registry::InstanceId;
use crate::value::{get_path, get_value_path, path_head, Props};

pub use methods::{MethodSlot, MethodSource};
pub use props::{PropSlot, PropSource};

/// What a tag hands to the instance it creates.
#[derive(Clone, Default)]
pub struct Externals {
    pub props: Props,
    pub methods: BTreeMap<String, MethodFn>,
    /// Prop name → dotted path into the parent's props.
    pub ref_props: BTreeMap<String, String>,
    /// Method name → parent method name.
    pub ref_methods: BTreeMap<String, String>,
}

/// The prop and method tables of one instance.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    props: BTreeMap<String, PropSlot>,
    methods: BTreeMap<String, MethodSlot>,
    external_defaults: Props,
}

impl StateStore {
    /// Tables as declared by a resolved definition. Global values stay
    /// undefined until [`StateStore::update_global`].
    pub fn from_definition(definition: &ComponentDefinition) -> Self {
        let spec = &definition.state;
        let mut props = BTreeMap::new();
        for (name, value) in &spec.props.local {
            props.insert(name.clone(), PropSlot::new(PropSource::Local, Some(value.clone())));
        }
        for (name, value) in &spec.props.external {
            props.insert(name.clone(), PropSlot::new(PropSource::External, Some(value.clone())));
        }
        for (name, global) in &spec.props.global {
            props.insert(
                name.clone(),
                PropSlot::new(
                    PropSource::Global {
                        data: global.data.clone(),
                        key: global.key.clone(),
                    },
                    None,
                ),
            );
        }

        let mut methods = BTreeMap::new();
        for (name, f) in &spec.methods.local {
            methods.insert(name.clone(), MethodSlot::new(MethodSource::Local(f.clone())));
        }
        for (name, global) in &spec.methods.global {
            methods.insert(
                name.clone(),
                MethodSlot::new(MethodSource::Global {
                    modifier: global.modifier.clone(),
                    key: global.key.clone(),
                }),
            );
        }

        Self {
            props,
            methods,
            external_defaults: spec.props.external.clone(),
        }
    }

    /// Install tag-supplied props and methods, replacing earlier ones.
    ///
    /// Tag props take a name over from any definition partition. A local
    /// method keeps its name and receives the tag's method as `next`.
    pub fn set_externals(&mut self, externals: &Externals) -> Vec<Conflict> {
        let mut conflicts = Vec::new();

        // Resolved references survive a reinstall with the same path.
        let mut resolved: BTreeMap<String, (String, Option<Value>)> = BTreeMap::new();
        self.props.retain(|name, slot| match &slot.source {
            PropSource::External => false,
            PropSource::Referenced { path } => {
                resolved.insert(name.clone(), (path.clone(), slot.value.take()));
                false
            }
            _ => true,
        });
        for (name, value) in &self.external_defaults {
            self.props
                .entry(name.clone())
                .or_insert_with(|| PropSlot::new(PropSource::External, Some(value.clone())));
        }
        for (name, value) in &externals.props {
            if let Some(existing) = self.props.get(name) {
                if existing.source != PropSource::External {
                    conflicts.push(conflict(name, "external", existing.source.partition()));
                }
            }
            self.props
                .insert(name.clone(), PropSlot::new(PropSource::External, Some(value.clone())));
        }
        for (name, path) in &externals.ref_props {
            if let Some(existing) = self.props.get(name) {
                let default_only =
                    existing.source == PropSource::External && !externals.props.contains_key(name);
                if !default_only {
                    conflicts.push(conflict(name, "referenced", existing.source.partition()));
                }
            }
            let value = resolved
                .remove(name)
                .and_then(|(previous, value)| (previous == *path).then_some(value).flatten());
            self.props.insert(
                name.clone(),
                PropSlot::new(PropSource::Referenced { path: path.clone() }, value),
            );
        }

        self.methods.retain(|_, slot| {
            !matches!(slot.source, MethodSource::External(_) | MethodSource::Referenced { .. })
        });
        for slot in self.methods.values_mut() {
            slot.shadowed = None;
        }
        let tag_methods = externals
            .methods
            .iter()
            .map(|(name, f)| (name, MethodSource::External(f.clone())))
            .chain(externals.ref_methods.iter().map(|(name, target)| {
                (
                    name,
                    MethodSource::Referenced {
                        name: target.clone(),
                    },
                )
            }));
        for (name, source) in tag_methods {
            match self.methods.get_mut(name) {
                Some(slot) if matches!(slot.source, MethodSource::Local(_)) => {
                    slot.shadowed = Some(source);
                }
                _ => {
                    self.methods.insert(name.clone(), MethodSlot::new(source));
                }
            }
        }

        conflicts
    }

    /// All defined props as one bag.
    pub fn flatten(&self) -> Props {
        self.props
            .iter()
            .filter_map(|(name, slot)| slot.value.clone().map(|v| (name.clone(), v)))
            .collect()
    }

    /// Partition of the prop named `name`.
    pub fn source_of(&self, name: &str) -> Option<&PropSource> {
        self.props.get(name).map(|slot| &slot.source)
    }

    /// Resolve a name or dotted path across all partitions.
    pub fn get_prop(&self, path: &str) -> Option<Value> {
        let head = path_head(path);
        let value = self.props.get(head)?.value.as_ref()?;
        if head.len() == path.len() {
            return Some(value.clone());
        }
        get_value_path(value, &path[head.len() + 1..]).cloned()
    }

    /// [`StateStore::get_prop`] for several paths at once.
    pub fn get_props(&self, paths: &[&str]) -> BTreeMap<String, Option<Value>> {
        paths
            .iter()
            .map(|&path| (path.to_owned(), self.get_prop(path)))
            .collect()
    }

    /// Merge `patch` into local state.
    ///
    /// Returns the changes and the keys that were rejected because another
    /// partition owns them, with that partition's name. New keys become local.
    pub fn set_local(&mut self, patch: &Props) -> (ChangeSet, Vec<(String, &'static str)>) {
        let mut changes = ChangeSet::new();
        let mut rejected = Vec::new();
        for (name, value) in patch {
            match self.props.get_mut(name) {
                Some(slot) if slot.source != PropSource::Local => {
                    rejected.push((name.clone(), slot.source.partition()));
                }
                Some(slot) => {
                    if slot.value.as_ref() != Some(value) {
                        changes.insert(
                            name.clone(),
                            Change::new(slot.value.take(), Some(value.clone())),
                        );
                    }
                    slot.value = Some(value.clone());
                }
                None => {
                    changes.insert(name.clone(), Change::new(None, Some(value.clone())));
                    self.props
                        .insert(name.clone(), PropSlot::new(PropSource::Local, Some(value.clone())));
                }
            }
        }
        (changes, rejected)
    }

    /// Re-resolve every referenced prop against the parent's props.
    pub fn update_referenced(&mut self, parent: &Props) -> ChangeSet {
        let mut changes = ChangeSet::new();
        for (name, slot) in &mut self.props {
            let PropSource::Referenced { path } = &slot.source else {
                continue;
            };
            let next = get_path(parent, path).cloned();
            if next != slot.value {
                changes.insert(name.clone(), Change::new(slot.value.clone(), next.clone()));
                slot.value = next;
            }
        }
        changes
    }

    /// Re-resolve every global prop. Returns the changes and the ids of
    /// Data entries that do not exist.
    pub fn update_global(&mut self, store: &GlobalStore) -> (ChangeSet, Vec<String>) {
        let mut changes = ChangeSet::new();
        let mut unknown = Vec::new();
        for (name, slot) in &mut self.props {
            let PropSource::Global { data, key } = &slot.source else {
                continue;
            };
            let Some(entry) = store.data(data) else {
                if !unknown.contains(data) {
                    unknown.push(data.clone());
                }
                continue;
            };
            let next = entry.get_prop(key);
            if next != slot.value {
                changes.insert(name.clone(), Change::new(slot.value.clone(), next.clone()));
                slot.value = next;
            }
        }
        (changes, unknown)
    }

    /// Map a change of Data `data` onto this instance's prop names.
    ///
    /// Only global props whose key head changed are considered; each one is
    /// re-read and reported (and cached) only if its value moved.
    pub fn global_changes_for(
        &mut self,
        data: &str,
        changed: &ChangeSet,
        store: &GlobalStore,
    ) -> ChangeSet {
        let mut changes = ChangeSet::new();
        let Some(entry) = store.data(data) else {
            return changes;
        };
        for (name, slot) in &mut self.props {
            let PropSource::Global { data: source, key } = &slot.source else {
                continue;
            };
            if source != data || !changed.contains(path_head(key)) {
                continue;
            }
            let next = entry.get_prop(key);
            if next != slot.value {
                changes.insert(name.clone(), Change::new(slot.value.clone(), next.clone()));
                slot.value = next;
            }
        }
        changes
    }

    /// Data ids this instance reads from.
    pub fn subscriptions(&self) -> BTreeSet<String> {
        self.props
            .values()
            .filter_map(|slot| match &slot.source {
                PropSource::Global { data, .. } => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Register `instance` for every Data entry it reads.
    pub fn add_routes(&self, instance: InstanceId, store: &mut GlobalStore) {
        for data in self.subscriptions() {
            store.subscribe(&data, instance);
        }
    }

    pub fn remove_routes(&self, instance: InstanceId, store: &mut GlobalStore) {
        store.unsubscribe_all(instance);
    }

    /// Current external props, for diffing on resume.
    pub fn external_snapshot(&self) -> Props {
        self.props
            .iter()
            .filter(|(_, slot)| slot.source == PropSource::External)
            .filter_map(|(name, slot)| slot.value.clone().map(|v| (name.clone(), v)))
            .collect()
    }

    pub fn has_references(&self) -> bool {
        self.props
            .values()
            .any(|slot| matches!(slot.source, PropSource::Referenced { .. }))
    }

    pub fn method(&self, name: &str) -> Option<MethodSlot> {
        self.methods.get(name).cloned()
    }

    pub fn method_names(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }
}

fn conflict(name: &str, kept: &'static str, dropped: &'static str) -> Conflict {
    Conflict {
        name: name.to_owned(),
        kept,
        dropped,
    }
}
