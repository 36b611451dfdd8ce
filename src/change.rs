//! Change detection: property-level diffs between props snapshots.
//!
//! A [`ChangeSet`] maps each changed key to its `{old_value, new_value}` pair.
//! Values compare structurally, so a sub-property mutation such as
//! `mainObj.passedProp` shows up as a change of `mainObj`. An empty
//! `ChangeSet` means nothing re-renders.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde_json::Value;

use crate::value::Props;

// ---------------------------------------------------------------------------
// Change / ChangeSet
// ---------------------------------------------------------------------------

/// One changed property. `None` stands for an undefined value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Change {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl Change {
    pub fn new(old_value: Option<Value>, new_value: Option<Value>) -> Self {
        Self {
            old_value,
            new_value,
        }
    }
}

/// Changed property name → [`Change`], ordered by key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeSet {
    entries: BTreeMap<String, Change>,
}

impl ChangeSet {
    /// An empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&Change> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Shorthand for the new value of `key`, if it changed and is defined.
    pub fn new_value(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).and_then(|c| c.new_value.as_ref())
    }

    /// Shorthand for the old value of `key`, if it changed and was defined.
    pub fn old_value(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).and_then(|c| c.old_value.as_ref())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Change> {
        self.entries.iter()
    }

    pub fn insert(&mut self, key: impl Into<String>, change: Change) {
        self.entries.insert(key.into(), change);
    }

    /// Coalesce `other` into `self`.
    ///
    /// Keys present in both keep the earliest old value and the latest new
    /// value, so a run of mutations reads as one transition. A key whose
    /// run ends where it started is dropped.
    pub fn union(&mut self, other: ChangeSet) {
        for (key, change) in other.entries {
            match self.entries.get_mut(&key) {
                Some(existing) => {
                    existing.new_value = change.new_value;
                    if existing.old_value == existing.new_value {
                        self.entries.remove(&key);
                    }
                }
                None => {
                    self.entries.insert(key, change);
                }
            }
        }
    }
}

impl IntoIterator for ChangeSet {
    type Item = (String, Change);
    type IntoIter = btree_map::IntoIter<String, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = (&'a String, &'a Change);
    type IntoIter = btree_map::Iter<'a, String, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<(String, Change)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (String, Change)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Diffing
// ---------------------------------------------------------------------------

/// Diff two full snapshots over the union of their keys.
///
/// The result is empty iff both snapshots are structurally equal.
pub fn diff(before: &Props, after: &Props) -> ChangeSet {
    let mut changes = ChangeSet::new();
    for (key, old) in before {
        match after.get(key) {
            Some(new) if new == old => {}
            new => changes.insert(key.clone(), Change::new(Some(old.clone()), new.cloned())),
        }
    }
    for (key, new) in after {
        if !before.contains_key(key) {
            changes.insert(key.clone(), Change::new(None, Some(new.clone())));
        }
    }
    changes
}

/// Diff a patch against a target over the patch's keys only.
///
/// With `merge`, every patched value is written into `target` as well.
pub fn set_changes(target: &mut Props, patch: &Props, merge: bool) -> ChangeSet {
    let mut changes = ChangeSet::new();
    for (key, new) in patch {
        let old = target.get(key);
        if old != Some(new) {
            changes.insert(key.clone(), Change::new(old.cloned(), Some(new.clone())));
        }
        if merge {
            target.insert(key.clone(), new.clone());
        }
    }
    changes
}
