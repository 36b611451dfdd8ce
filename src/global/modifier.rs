//! Modifiers: named method bundles, the only writers of Data.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::change::ChangeSet;
use crate::scope::{ModifierHandle, Scope};

/// A modifier method.
pub type ModifierFn = Rc<dyn Fn(&ModifierCtx, &[Value]) -> Value>;

/// Declaration of a Modifier.
#[derive(Clone)]
pub struct ModifierDefinition {
    pub id: String,
    pub(crate) extend: Option<(u64, String)>,
    pub methods: BTreeMap<String, ModifierFn>,
}

impl ModifierDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extend: None,
            methods: BTreeMap::new(),
        }
    }

    /// Inherit `parent`'s methods; methods declared here override by name.
    pub fn extend(mut self, parent: &ModifierHandle) -> Self {
        self.extend = Some((parent.scope_id(), parent.id().to_owned()));
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&ModifierCtx, &[Value]) -> Value + 'static,
    ) -> Self {
        self.methods.insert(name.into(), Rc::new(f));
        self
    }

    pub fn get(&self, name: &str) -> Option<ModifierFn> {
        self.methods.get(name).cloned()
    }
}

impl fmt::Debug for ModifierDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifierDefinition")
            .field("id", &self.id)
            .field("extend", &self.extend)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// What a modifier method sees.
///
/// Writes go through the scope, so every write fans out to subscribers.
pub struct ModifierCtx {
    scope: Scope,
    modifier: String,
}

impl ModifierCtx {
    pub(crate) fn new(scope: Scope, modifier: impl Into<String>) -> Self {
        Self {
            scope,
            modifier: modifier.into(),
        }
    }

    /// Id of the modifier whose method is running.
    pub fn id(&self) -> &str {
        &self.modifier
    }

    /// Merge `patch` into Data `data` and notify its subscribers.
    pub fn set_props(&self, data: &str, patch: Value) -> ChangeSet {
        self.scope.write_data(&self.modifier, data, patch)
    }

    /// Read a dotted path from Data `data`.
    pub fn get_prop(&self, data: &str, path: &str) -> Option<Value> {
        self.scope.read_data(&self.modifier, data, path)
    }

    /// Call another method of this modifier (inherited ones included).
    pub fn call(&self, name: &str, args: &[Value]) -> Value {
        self.scope.call_modifier(&self.modifier, name, args)
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}
