//! Component definitions: immutable templates built with a fluent builder.
//!
//! A definition has a state layer (props and methods by partition, lifecycle
//! hooks, the `change` hook) and a view layer (render function, its own
//! lifecycle hooks, declared events). `extend` points at a parent definition
//! in the same scope; see [`chain`] for how the two are merged.

pub mod chain;

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::change::ChangeSet;
use crate::component::Ctx;
use crate::scope::ComponentHandle;
use crate::value::Props;

pub use chain::{DefinitionArena, DefinitionKey};

/// A lifecycle hook.
pub type LifecycleFn = Rc<dyn Fn(&Ctx, &ChangeSet)>;
/// The state `change` hook. Returning `false` vetoes reference/global renders.
pub type ChangeFn = Rc<dyn Fn(&Ctx, &ChangeSet) -> bool>;
/// The render function. `None` or an empty string means "keep what is there".
pub type RenderFn = Rc<dyn Fn(&Ctx, &ChangeSet) -> Option<String>>;
/// A component method.
pub type MethodFn = Rc<dyn Fn(&Ctx, &[Value]) -> Value>;

/// Which half of a definition a hook belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    State,
    View,
}

/// Lifecycle hook names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Hook {
    PreMount,
    Mount,
    PostMount,
    PreRender,
    PostRender,
    Resume,
    DescendantChange,
    PreDestroy,
    Destroy,
}

/// A global prop: key path inside a Data entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalKey {
    pub data: String,
    pub key: String,
}

/// A global method: method key inside a Modifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalMethod {
    pub modifier: String,
    pub key: String,
}

/// Props declared by a definition, by partition.
#[derive(Debug, Clone, Default)]
pub struct PropSpecs {
    pub local: Props,
    /// Defaults for props a tag is expected to supply.
    pub external: Props,
    pub global: BTreeMap<String, GlobalKey>,
}

/// Methods declared by a definition, by partition.
#[derive(Clone, Default)]
pub struct MethodSpecs {
    pub local: BTreeMap<String, MethodFn>,
    pub global: BTreeMap<String, GlobalMethod>,
}

#[derive(Clone, Default)]
pub struct StateSpec {
    pub props: PropSpecs,
    pub methods: MethodSpecs,
    pub hooks: BTreeMap<Hook, LifecycleFn>,
    pub change: Option<ChangeFn>,
}

#[derive(Clone, Default)]
pub struct ViewSpec {
    pub render: Option<RenderFn>,
    pub hooks: BTreeMap<Hook, LifecycleFn>,
    pub events: Vec<EventSpec>,
}

/// A declared DOM event: `event` on `selector` (or the root) calls `handler`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSpec {
    pub event: String,
    pub selector: Option<String>,
    pub handler: String,
}

impl EventSpec {
    /// Identity of the binding: `selector:event:handler`.
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.selector.as_deref().unwrap_or(""),
            self.event,
            self.handler
        )
    }
}

/// Reference to a parent definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DefinitionRef {
    pub(crate) scope_id: u64,
    pub(crate) key: DefinitionKey,
}

/// An immutable component template.
#[derive(Clone)]
pub struct ComponentDefinition {
    pub id: String,
    pub(crate) extend: Option<DefinitionRef>,
    pub state: StateSpec,
    pub view: ViewSpec,
}

impl ComponentDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extend: None,
            state: StateSpec::default(),
            view: ViewSpec::default(),
        }
    }

    /// Inherit from `parent` (builder).
    pub fn extend(mut self, parent: &ComponentHandle) -> Self {
        self.extend = Some(parent.definition_ref());
        self
    }

    pub fn local_prop(mut self, name: impl Into<String>, value: Value) -> Self {
        self.state.props.local.insert(name.into(), value);
        self
    }

    /// Declare a tag-supplied prop with a default.
    pub fn external_prop(mut self, name: impl Into<String>, default: Value) -> Self {
        self.state.props.external.insert(name.into(), default);
        self
    }

    pub fn global_prop(
        mut self,
        name: impl Into<String>,
        data: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.state.props.global.insert(
            name.into(),
            GlobalKey {
                data: data.into(),
                key: key.into(),
            },
        );
        self
    }

    pub fn local_method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&Ctx, &[Value]) -> Value + 'static,
    ) -> Self {
        self.state.methods.local.insert(name.into(), Rc::new(method));
        self
    }

    pub fn global_method(
        mut self,
        name: impl Into<String>,
        modifier: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.state.methods.global.insert(
            name.into(),
            GlobalMethod {
                modifier: modifier.into(),
                key: key.into(),
            },
        );
        self
    }

    /// Add a state-layer lifecycle hook.
    pub fn on(mut self, hook: Hook, f: impl Fn(&Ctx, &ChangeSet) + 'static) -> Self {
        self.state.hooks.insert(hook, Rc::new(f));
        self
    }

    /// Add a view-layer lifecycle hook.
    pub fn view_on(mut self, hook: Hook, f: impl Fn(&Ctx, &ChangeSet) + 'static) -> Self {
        self.view.hooks.insert(hook, Rc::new(f));
        self
    }

    pub fn on_change(mut self, f: impl Fn(&Ctx, &ChangeSet) -> bool + 'static) -> Self {
        self.state.change = Some(Rc::new(f));
        self
    }

    pub fn render(mut self, f: impl Fn(&Ctx, &ChangeSet) -> Option<String> + 'static) -> Self {
        self.view.render = Some(Rc::new(f));
        self
    }

    /// Bind `event` on the root element to method `handler`.
    pub fn event(self, event: impl Into<String>, handler: impl Into<String>) -> Self {
        self.push_event(event.into(), None, handler.into())
    }

    /// Bind `event` on every element matching `selector` to method `handler`.
    pub fn event_on(
        self,
        event: impl Into<String>,
        selector: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        self.push_event(event.into(), Some(selector.into()), handler.into())
    }

    fn push_event(mut self, event: String, selector: Option<String>, handler: String) -> Self {
        self.view.events.push(EventSpec {
            event,
            selector,
            handler,
        });
        self
    }

    // -- lookups -------------------------------------------------------------

    pub fn hook(&self, layer: Layer, hook: Hook) -> Option<LifecycleFn> {
        let hooks = match layer {
            Layer::State => &self.state.hooks,
            Layer::View => &self.view.hooks,
        };
        hooks.get(&hook).cloned()
    }

    pub fn method(&self, name: &str) -> Option<MethodFn> {
        self.state.methods.local.get(name).cloned()
    }

    pub fn render_fn(&self) -> Option<RenderFn> {
        self.view.render.clone()
    }

    pub fn change_fn(&self) -> Option<ChangeFn> {
        self.state.change.clone()
    }

    pub fn has_extend(&self) -> bool {
        self.extend.is_some()
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("id", &self.id)
            .field("extend", &self.extend)
            .field("props", &self.state.props)
            .field("methods", &self.state.methods.local.keys().collect::<Vec<_>>())
            .field("global_methods", &self.state.methods.global)
            .field("state_hooks", &self.state.hooks.keys().collect::<Vec<_>>())
            .field("view_hooks", &self.view.hooks.keys().collect::<Vec<_>>())
            .field("render", &self.view.render.is_some())
            .field("events", &self.view.events)
            .finish()
    }
}
