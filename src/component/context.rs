//! Ctx: what hooks, render functions and methods see of their instance.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::change::ChangeSet;
use crate::dom::ElementId;
use crate::error::Diagnostic;
use crate::registry::InstanceId;
use crate::scope::Scope;
use crate::state::MethodSource;
use crate::value::Props;

/// Longest chain of referenced-method hops a call may follow.
const MAX_CALL_HOPS: usize = 32;

/// A method bound to the instance that owns it.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    pub instance: InstanceId,
    pub source: MethodSource,
}

/// Handle passed to user code for one instance.
pub struct Ctx {
    scope: Scope,
    instance: InstanceId,
    next: Option<BoundMethod>,
    origin: Option<String>,
}

impl Ctx {
    pub(crate) fn new(scope: Scope, instance: InstanceId, origin: Option<String>) -> Self {
        Self {
            scope,
            instance,
            next: None,
            origin,
        }
    }

    fn with_next(mut self, next: Option<BoundMethod>) -> Self {
        self.next = next;
        self
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn identifier(&self) -> String {
        self.scope
            .state()
            .registry
            .get(self.instance)
            .map(|i| i.identifier.clone())
            .unwrap_or_default()
    }

    pub fn element(&self) -> Option<ElementId> {
        self.scope.element_of(self.instance)
    }

    /// HTML applied by the last render.
    pub fn html(&self) -> Option<String> {
        self.scope.html_of(self.instance)
    }

    /// Content the element carried when this instance was bound to it.
    pub fn original_html(&self) -> String {
        self.scope
            .state()
            .registry
            .get(self.instance)
            .map(|i| i.original_html.clone())
            .unwrap_or_default()
    }

    /// Identifier of the descendant behind a `descendantChange`.
    pub fn descendant(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// All props, flattened across partitions.
    pub fn props(&self) -> Props {
        self.scope.props_of(self.instance).unwrap_or_default()
    }

    /// Resolve a prop name or dotted path. A miss is reported with a
    /// snapshot of the props searched.
    pub fn get_prop(&self, path: &str) -> Option<Value> {
        let lookup = {
            let state = self.scope.state();
            state
                .registry
                .get(self.instance)
                .map(|i| (i.state.get_prop(path), i.identifier.clone()))
        };
        let (found, owner) = lookup?;
        if found.is_none() {
            self.report_missing(owner, path);
        }
        found
    }

    /// [`Ctx::get_prop`] for several paths.
    pub fn get_props(&self, paths: &[&str]) -> BTreeMap<String, Option<Value>> {
        paths
            .iter()
            .map(|&path| (path.to_owned(), self.get_prop(path)))
            .collect()
    }

    fn report_missing(&self, owner: String, path: &str) {
        let snapshot = Value::Object(self.props());
        self.scope.report(Diagnostic::MissingProp {
            owner,
            path: path.to_owned(),
            snapshot,
        });
    }

    /// Merge `patch` into local props and queue `localChange`. With
    /// `propagate`, referencing descendants are updated first.
    pub fn set_props(&self, patch: Value, propagate: bool) -> ChangeSet {
        self.scope.set_local_props(self.instance, patch, propagate)
    }

    /// Call a method of this instance by name.
    pub fn call(&self, name: &str, args: &[Value]) -> Value {
        call_method(&self.scope, self.instance, name, args)
    }

    /// Call the tag-supplied method this local method shadows.
    pub fn call_next(&self, args: &[Value]) -> Value {
        match &self.next {
            Some(next) => invoke(&self.scope, next.instance, "next", next.source.clone(), None, args, 1),
            None => Value::Null,
        }
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Rebind declared events, e.g. after touching the DOM by hand.
    pub fn bind_events(&self) {
        self.scope.bind_events(self.instance);
    }
}

/// Resolve `name` on `instance` and call it.
pub(crate) fn call_method(scope: &Scope, instance: InstanceId, name: &str, args: &[Value]) -> Value {
    call_at_depth(scope, instance, name, args, 0)
}

fn call_at_depth(
    scope: &Scope,
    instance: InstanceId,
    name: &str,
    args: &[Value],
    hops: usize,
) -> Value {
    let found = {
        let state = scope.state();
        state
            .registry
            .get(instance)
            .map(|i| (i.identifier.clone(), i.state.method(name)))
    };
    let Some((identifier, slot)) = found else {
        return Value::Null;
    };
    let Some(slot) = slot.filter(|_| hops <= MAX_CALL_HOPS) else {
        scope.report(Diagnostic::MissingHandler {
            component: identifier,
            handler: name.to_owned(),
        });
        return Value::Null;
    };
    invoke(scope, instance, name, slot.source, slot.shadowed, args, hops)
}

fn invoke(
    scope: &Scope,
    instance: InstanceId,
    name: &str,
    source: MethodSource,
    shadowed: Option<MethodSource>,
    args: &[Value],
    hops: usize,
) -> Value {
    match source {
        MethodSource::Local(f) => {
            let next = shadowed.map(|source| BoundMethod { instance, source });
            let ctx = Ctx::new(scope.clone(), instance, None).with_next(next);
            f(&ctx, args)
        }
        MethodSource::External(f) => f(&Ctx::new(scope.clone(), instance, None), args),
        MethodSource::Referenced { name: target } => {
            let parent = scope.parent_of(instance);
            match parent {
                Some(parent) => call_at_depth(scope, parent, &target, args, hops + 1),
                None => {
                    let component = scope
                        .state()
                        .registry
                        .get(instance)
                        .map(|i| i.identifier.clone())
                        .unwrap_or_default();
                    scope.report(Diagnostic::MissingHandler {
                        component,
                        handler: name.to_owned(),
                    });
                    Value::Null
                }
            }
        }
        MethodSource::Global { modifier, key } => {
            let owner = scope
                .state()
                .registry
                .get(instance)
                .map(|i| i.identifier.clone())
                .unwrap_or_default();
            scope.invoke_modifier(&owner, &modifier, &key, args)
        }
    }
}
