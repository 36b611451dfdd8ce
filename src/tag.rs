//! Tags: deferred requests for one component occurrence.
//!
//! A tag collects what the occurrence receives (props, methods, references
//! into the parent) and renders to a custom element carrying its identifier.
//! The instance itself is created when that element enters the document.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;

use crate::component::Ctx;
use crate::definition::MethodFn;
use crate::scope::ComponentHandle;
use crate::state::Externals;
use crate::value::into_props;

/// Element name prefix of component elements.
pub const TAG_PREFIX: &str = "sc-";
/// Attribute holding the instance identifier.
pub const IDENTIFIER_ATTRIBUTE: &str = "data-sc-id";

/// Builder for one component occurrence.
pub struct Tag {
    pub(crate) handle: ComponentHandle,
    pub(crate) externals: Externals,
    pub(crate) id: Option<String>,
    pub(crate) content: String,
}

impl Tag {
    pub(crate) fn new(handle: ComponentHandle) -> Self {
        Self {
            handle,
            externals: Externals::default(),
            id: None,
            content: String::new(),
        }
    }

    /// Merge an object of external props. Non-objects are ignored.
    pub fn props(mut self, props: Value) -> Self {
        if let Some(props) = into_props(props) {
            self.externals.props.extend(props);
        }
        self
    }

    pub fn prop(mut self, name: impl Into<String>, value: Value) -> Self {
        self.externals.props.insert(name.into(), value);
        self
    }

    pub fn methods(mut self, methods: impl IntoIterator<Item = (String, MethodFn)>) -> Self {
        self.externals.methods.extend(methods);
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&Ctx, &[Value]) -> Value + 'static,
    ) -> Self {
        self.externals.methods.insert(name.into(), Rc::new(f));
        self
    }

    /// Map props of the new instance to dotted paths in the parent's props.
    pub fn ref_props<K, P>(mut self, refs: impl IntoIterator<Item = (K, P)>) -> Self
    where
        K: Into<String>,
        P: Into<String>,
    {
        self.externals
            .ref_props
            .extend(refs.into_iter().map(|(k, p)| (k.into(), p.into())));
        self
    }

    /// Map methods of the new instance to methods of the parent.
    pub fn ref_methods<K, M>(mut self, refs: impl IntoIterator<Item = (K, M)>) -> Self
    where
        K: Into<String>,
        M: Into<String>,
    {
        self.externals
            .ref_methods
            .extend(refs.into_iter().map(|(k, m)| (k.into(), m.into())));
        self
    }

    /// Use a fixed identifier. The instance then survives removal and
    /// resumes when an element with the same identifier comes back.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Markup placed inside the element until the first render.
    pub fn content(mut self, html: impl Into<String>) -> Self {
        self.content = html.into();
        self
    }

    /// Register the tag and return its markup. Empty once the scope is gone.
    pub fn render(self) -> String {
        match self.handle.scope() {
            Some(scope) => scope.register_tag(self),
            None => String::new(),
        }
    }
}

impl std::fmt::Debug for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tag")
            .field("component", &self.handle.id())
            .field("id", &self.id)
            .field("props", &self.externals.props)
            .field("methods", &self.externals.methods.keys().collect::<Vec<_>>())
            .field("ref_props", &self.externals.ref_props)
            .field("ref_methods", &self.externals.ref_methods)
            .finish()
    }
}

/// Collect ref pairs from literals, e.g. `refs([("check", "passedProp")])`.
pub fn refs<const N: usize>(pairs: [(&str, &str); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
}
