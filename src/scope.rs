//! Scope: an isolated namespace of definitions plus the document, registry,
//! global store and scheduler that bring them to life.
//!
//! A [`Scope`] is a cheap `Rc` handle. All mutable state sits in one
//! `RefCell`; every method borrows it for as long as it takes to read or
//! write tables and releases it before any user closure runs.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::change::ChangeSet;
use crate::config::ScopeConfig;
use crate::definition::{ComponentDefinition, DefinitionArena, DefinitionKey, DefinitionRef};
use crate::dom::{Document, DomEvent, Element, ElementId, Listener, ListenerId};
use crate::error::{Diagnostic, Diagnostics, ScopeError};
use crate::global::{DataDefinition, GlobalStore, LookupError, ModifierCtx, ModifierDefinition};
use crate::registry::{ComponentRegistry, InstanceId};
use crate::sequence::{FollowUp, Phase, Scheduler, SequenceJob, SequenceName, SequenceOutcome};
use crate::state::Externals;
use crate::tag::Tag;
use crate::value::{into_props, Props};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Create a scope with the default configuration.
pub fn create_scope() -> Scope {
    Scope::with_config(ScopeConfig::default())
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

/// What a rendered tag asked for, keyed by identifier.
#[derive(Clone)]
pub(crate) struct TagRecord {
    pub(crate) definition: DefinitionKey,
    pub(crate) externals: Externals,
    pub(crate) explicit_id: bool,
}

/// Identifier allocation for tags rendered inside one render call.
pub(crate) struct RenderFrame {
    pub(crate) owner: String,
    pub(crate) ordinals: HashMap<String, usize>,
}

pub(crate) struct ScopeState {
    pub(crate) document: Document,
    pub(crate) registry: ComponentRegistry,
    pub(crate) definitions: DefinitionArena,
    pub(crate) globals: GlobalStore,
    pub(crate) tags: HashMap<String, TagRecord>,
    pub(crate) scheduler: Scheduler,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) render_stack: Vec<RenderFrame>,
    pub(crate) top_level: HashMap<String, usize>,
}

pub(crate) struct ScopeInner {
    pub(crate) id: u64,
    pub(crate) config: ScopeConfig,
    pub(crate) state: RefCell<ScopeState>,
    flushing: Cell<bool>,
}

/// Resets the flushing flag, also on unwind.
struct FlushGuard<'a>(&'a Cell<bool>);

impl<'a> FlushGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Handle to a scope. Clones share the same scope.
#[derive(Clone)]
pub struct Scope {
    pub(crate) inner: Rc<ScopeInner>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.try_borrow();
        let mut out = f.debug_struct("Scope");
        out.field("id", &self.inner.id);
        if let Ok(state) = state {
            out.field("definitions", &state.definitions.len())
                .field("instances", &state.registry.len())
                .field("document", &state.document);
        }
        out.finish()
    }
}

impl Scope {
    pub fn with_config(config: ScopeConfig) -> Self {
        let state = ScopeState {
            document: Document::new(),
            registry: ComponentRegistry::new(),
            definitions: DefinitionArena::new(),
            globals: GlobalStore::new(),
            tags: HashMap::new(),
            scheduler: Scheduler::new(),
            diagnostics: Diagnostics::default(),
            render_stack: Vec::new(),
            top_level: HashMap::new(),
        };
        Self {
            inner: Rc::new(ScopeInner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                config,
                state: RefCell::new(state),
                flushing: Cell::new(false),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.inner.config
    }

    pub(crate) fn state(&self) -> Ref<'_, ScopeState> {
        self.inner.state.borrow()
    }

    pub(crate) fn state_mut(&self) -> RefMut<'_, ScopeState> {
        self.inner.state.borrow_mut()
    }

    pub(crate) fn downgrade(&self) -> Weak<ScopeInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn report(&self, diagnostic: Diagnostic) {
        self.state_mut().diagnostics.report(diagnostic);
    }

    // -- definitions ----------------------------------------------------------

    /// Register a component definition.
    ///
    /// Prop declarations that collide across partitions are resolved and
    /// reported as diagnostics; the call still succeeds.
    pub fn create_component(
        &self,
        definition: ComponentDefinition,
    ) -> Result<ComponentHandle, ScopeError> {
        if let Some(parent) = definition.extend {
            if parent.scope_id != self.inner.id {
                return Err(ScopeError::ForeignDefinition(definition.id));
            }
        }
        let id = definition.id.clone();
        let registered = self
            .state_mut()
            .definitions
            .insert(definition, self.inner.config.max_extend_depth);
        let (key, proto, conflicts) = registered?;
        for conflict in conflicts {
            self.report(Diagnostic::PartitionConflict {
                component: id.clone(),
                name: conflict.name,
                kept: conflict.kept,
                dropped: conflict.dropped,
            });
        }
        tracing::debug!(target: "sepcon", component = %id, "component registered");
        Ok(ComponentHandle {
            scope: self.downgrade(),
            scope_id: self.inner.id,
            key,
            id,
            proto,
        })
    }

    /// Register a Data entry. Its `defaults` are the initial value.
    pub fn create_data(&self, definition: DataDefinition) -> Result<DataHandle, ScopeError> {
        if let Some((scope_id, _)) = &definition.extend {
            if *scope_id != self.inner.id {
                return Err(ScopeError::ForeignDefinition(definition.id));
            }
        }
        let id = definition.id.clone();
        self.state_mut().globals.insert_data(definition)?;
        Ok(DataHandle {
            scope: self.downgrade(),
            scope_id: self.inner.id,
            id,
        })
    }

    /// Register a Modifier.
    pub fn create_modifier(
        &self,
        definition: ModifierDefinition,
    ) -> Result<ModifierHandle, ScopeError> {
        if let Some((scope_id, _)) = &definition.extend {
            if *scope_id != self.inner.id {
                return Err(ScopeError::ForeignDefinition(definition.id));
            }
        }
        let proto = self.state_mut().globals.insert_modifier(definition)?;
        Ok(ModifierHandle {
            scope: self.downgrade(),
            scope_id: self.inner.id,
            id: proto.id.clone(),
            proto,
        })
    }

    // -- global data ------------------------------------------------------------

    /// Merge `patch` into Data `data` and collect per-subscriber changes
    /// behind the debounce window. `owner` names the writer in diagnostics.
    pub(crate) fn write_data(&self, owner: &str, data: &str, patch: Value) -> ChangeSet {
        let Some(patch) = into_props(patch) else {
            tracing::warn!(target: "sepcon", owner, data, "data patch is not an object");
            return ChangeSet::new();
        };
        let written = {
            let mut state = self.state_mut();
            state.globals.data_mut(data).map(|entry| entry.set_props(&patch))
        };
        let Some(changed) = written else {
            self.report(Diagnostic::UnknownData {
                owner: owner.to_owned(),
                data: data.to_owned(),
            });
            return ChangeSet::new();
        };
        if changed.is_empty() {
            return changed;
        }

        let deadline = Instant::now() + self.inner.config.debounce;
        let mut state = self.state_mut();
        let ScopeState {
            registry,
            globals,
            scheduler,
            ..
        } = &mut *state;
        for subscriber in globals.subscribers(data) {
            let Some(instance) = registry.get_mut(subscriber) else {
                continue;
            };
            if !instance.active {
                continue;
            }
            let mine = instance.state.global_changes_for(data, &changed, globals);
            if !mine.is_empty() {
                scheduler.collect(subscriber, mine, deadline);
            }
        }
        changed
    }

    /// Read a dotted path from Data `data`.
    pub(crate) fn read_data(&self, owner: &str, data: &str, path: &str) -> Option<Value> {
        let lookup = {
            let state = self.state();
            state
                .globals
                .data(data)
                .map(|entry| (entry.get_prop(path), entry.value().clone()))
        };
        match lookup {
            None => {
                self.report(Diagnostic::UnknownData {
                    owner: owner.to_owned(),
                    data: data.to_owned(),
                });
                None
            }
            Some((None, snapshot)) => {
                self.report(Diagnostic::MissingProp {
                    owner: owner.to_owned(),
                    path: path.to_owned(),
                    snapshot: Value::Object(snapshot),
                });
                None
            }
            Some((found, _)) => found,
        }
    }

    /// Call method `name` of modifier `modifier` on behalf of `owner`.
    pub(crate) fn invoke_modifier(
        &self,
        owner: &str,
        modifier: &str,
        name: &str,
        args: &[Value],
    ) -> Value {
        let method = self.state().globals.modifier_method(modifier, name);
        match method {
            Ok(f) => {
                let ctx = ModifierCtx::new(self.clone(), modifier);
                f(&ctx, args)
            }
            Err(LookupError::UnknownModifier) => {
                self.report(Diagnostic::UnknownModifier {
                    owner: owner.to_owned(),
                    modifier: modifier.to_owned(),
                });
                Value::Null
            }
            Err(LookupError::UnknownMethod) => {
                self.report(Diagnostic::MissingHandler {
                    component: modifier.to_owned(),
                    handler: name.to_owned(),
                });
                Value::Null
            }
        }
    }

    pub(crate) fn call_modifier(&self, modifier: &str, name: &str, args: &[Value]) -> Value {
        self.invoke_modifier(modifier, modifier, name, args)
    }

    /// Current value of Data `id`.
    pub fn data_value(&self, id: &str) -> Option<Props> {
        self.state().globals.data(id).map(|entry| entry.value().clone())
    }

    // -- tags -------------------------------------------------------------------

    /// Register a tag and return its markup.
    pub(crate) fn register_tag(&self, tag: Tag) -> String {
        let Tag {
            handle,
            externals,
            id,
            content,
        } = tag;
        let definition_id = handle.id.clone();
        let explicit_id = id.is_some();

        let mut state = self.state_mut();
        let identifier = match id {
            Some(id) => id,
            None => {
                let ScopeState {
                    render_stack,
                    top_level,
                    ..
                } = &mut *state;
                match render_stack.last_mut() {
                    Some(frame) => {
                        let ordinal = frame.ordinals.entry(definition_id.clone()).or_insert(0);
                        let identifier = format!("{}/{}:{}", frame.owner, definition_id, ordinal);
                        *ordinal += 1;
                        identifier
                    }
                    None => {
                        let n = top_level.entry(definition_id.clone()).or_insert(0);
                        let identifier = format!("{definition_id}:{n}");
                        *n += 1;
                        identifier
                    }
                }
            }
        };
        state.tags.insert(
            identifier.clone(),
            TagRecord {
                definition: handle.key,
                externals,
                explicit_id,
            },
        );
        drop(state);

        let tag_name = format!("sc-{}", definition_id.to_ascii_lowercase());
        format!(
            "<{tag_name} {}=\"{}\">{content}</{tag_name}>",
            crate::tag::IDENTIFIER_ATTRIBUTE,
            crate::dom::parse::escape_attribute(&identifier)
        )
    }

    // -- document -------------------------------------------------------------

    /// Create a detached element, e.g. a host to mount markup into.
    pub fn create_element(&self, tag: &str) -> ElementId {
        self.state_mut().document.create_element(Element::new(tag))
    }

    /// Append a new empty element under `parent`.
    pub fn append_element(&self, parent: ElementId, tag: &str) -> Result<ElementId, ScopeError> {
        self.state_mut()
            .document
            .append_child(parent, Element::new(tag))
            .ok_or(ScopeError::UnknownElement)
    }

    /// Replace the content of `element`, destroying the components it held
    /// and connecting the ones the new markup contains, then flush.
    pub fn set_inner_html(&self, element: ElementId, html: &str) -> Result<(), ScopeError> {
        if !self.state().document.contains(element) {
            return Err(ScopeError::UnknownElement);
        }
        self.apply_inner_html(element, html);
        self.flush();
        Ok(())
    }

    /// Remove `element` and its subtree, destroying every component in it.
    pub fn remove(&self, element: ElementId) -> Result<(), ScopeError> {
        let doomed = {
            let state = self.state();
            if !state.document.contains(element) {
                return Err(ScopeError::UnknownElement);
            }
            state
                .document
                .subtree(element)
                .into_iter()
                .filter_map(|el| state.registry.by_element(el))
                .collect::<Vec<_>>()
        };
        for instance in doomed {
            self.destroy_instance(instance);
        }
        self.state_mut().document.remove(element);
        self.flush();
        Ok(())
    }

    /// Dispatch `name` on `target` and bubble it to the root, then flush.
    pub fn dispatch(&self, target: ElementId, name: &str, detail: Value) -> Result<(), ScopeError> {
        let listeners: Vec<(ElementId, ListenerId, Listener)> = {
            let state = self.state();
            if !state.document.contains(target) {
                return Err(ScopeError::UnknownElement);
            }
            state
                .document
                .bubble_path(target)
                .into_iter()
                .flat_map(|el| {
                    state
                        .document
                        .listeners(el, name)
                        .into_iter()
                        .map(move |(id, listener)| (el, id, listener))
                })
                .collect()
        };
        for (current_target, listener_id, listener) in listeners {
            // An earlier handler may have re-rendered this listener away.
            if !self.state().document.has_listener(listener_id) {
                continue;
            }
            listener(&DomEvent {
                name: name.to_owned(),
                target,
                current_target,
                detail: detail.clone(),
            });
        }
        self.flush();
        Ok(())
    }

    /// Borrow the document for inspection.
    ///
    /// The borrow must be released before driving the scope again.
    pub fn document(&self) -> Ref<'_, Document> {
        Ref::map(self.state(), |state| &state.document)
    }

    // -- driving ----------------------------------------------------------------

    /// Run queued sequence jobs until the queue is empty.
    ///
    /// A call made while a flush is already running returns at once; the
    /// running flush picks up whatever was queued.
    pub fn flush(&self) {
        if self.inner.flushing.get() {
            return;
        }
        let _guard = FlushGuard::enter(&self.inner.flushing);
        let limit = self.inner.config.max_jobs_per_flush;
        let mut ran = 0;
        loop {
            let job = self.state_mut().scheduler.pop();
            let Some(job) = job else {
                break;
            };
            if ran == limit {
                let dropped = 1 + self.state_mut().scheduler.clear_queue();
                drop(job);
                self.report(Diagnostic::RunawayFlush { limit, dropped });
                break;
            }
            ran += 1;
            self.run_job(job);
        }
    }

    /// Fire every debounce timer due at `now`, then flush.
    pub fn tick_at(&self, now: Instant) {
        let due = self.state_mut().scheduler.take_due(now);
        for (instance, changes) in due {
            // Writes that cancelled out inside the window.
            if changes.is_empty() || !self.is_active(instance) {
                continue;
            }
            self.cascade_references(instance);
            self.enqueue(
                SequenceJob::new(instance, SequenceName::GlobalChange)
                    .with_changes(changes)
                    .with_follow_up(FollowUp::RepairHtml),
            );
        }
        self.flush();
    }

    pub fn tick(&self) {
        self.tick_at(Instant::now());
    }

    /// Flush, then sleep until each pending debounce deadline and fire it,
    /// until nothing is queued or pending.
    pub async fn run_until_idle(&self) {
        loop {
            self.flush();
            let next = self.state().scheduler.next_deadline();
            let Some(deadline) = next else {
                break;
            };
            tokio::time::sleep_until(deadline).await;
            self.tick_at(Instant::now());
        }
    }

    /// Whether nothing is queued and no debounce timer is pending.
    pub fn is_idle(&self) -> bool {
        self.state().scheduler.is_idle()
    }

    pub(crate) fn enqueue(&self, job: SequenceJob) -> oneshot::Receiver<SequenceOutcome> {
        tracing::trace!(target: "sepcon", sequence = %job.name, "sequence queued");
        self.state_mut().scheduler.enqueue(job)
    }

    /// Queue sequence `name` for `instance` and flush.
    ///
    /// The receiver resolves when the sequence and its HTML repair settle. It
    /// closes without a value if the job is dropped by a runaway flush.
    pub fn start_sequence(
        &self,
        instance: InstanceId,
        name: SequenceName,
        changes: ChangeSet,
    ) -> oneshot::Receiver<SequenceOutcome> {
        let done = self.enqueue(
            SequenceJob::new(instance, name)
                .with_changes(changes)
                .with_follow_up(FollowUp::RepairHtml),
        );
        self.flush();
        done
    }

    /// Write local props of `instance` from outside a component.
    pub fn set_props(&self, instance: InstanceId, patch: Value, propagate: bool) -> ChangeSet {
        self.set_local_props(instance, patch, propagate)
    }

    // -- inspection -------------------------------------------------------------

    pub fn instance_by_identifier(&self, identifier: &str) -> Option<InstanceId> {
        self.state().registry.by_identifier(identifier)
    }

    pub fn instance_at(&self, element: ElementId) -> Option<InstanceId> {
        self.state().registry.by_element(element)
    }

    pub fn instance_count(&self) -> usize {
        self.state().registry.len()
    }

    /// Flattened props of `instance`.
    pub fn props_of(&self, instance: InstanceId) -> Option<Props> {
        self.state()
            .registry
            .get(instance)
            .map(|i| i.state.flatten())
    }

    /// HTML last applied by `instance`'s render.
    pub fn html_of(&self, instance: InstanceId) -> Option<String> {
        self.state()
            .registry
            .get(instance)
            .and_then(|i| i.current_html.clone())
    }

    pub fn phase_of(&self, instance: InstanceId) -> Option<Phase> {
        self.state().registry.get(instance).map(|i| i.phase)
    }

    pub fn element_of(&self, instance: InstanceId) -> Option<ElementId> {
        self.state().registry.get(instance).map(|i| i.element)
    }

    pub fn is_active(&self, instance: InstanceId) -> bool {
        self.state()
            .registry
            .get(instance)
            .is_some_and(|i| i.active)
    }

    pub fn parent_of(&self, instance: InstanceId) -> Option<InstanceId> {
        self.state().registry.parent(instance)
    }

    /// Listeners tracked for `instance`'s declared events.
    pub fn bound_listeners(&self, instance: InstanceId) -> usize {
        self.state()
            .registry
            .get(instance)
            .map_or(0, |i| i.listener_count())
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.state().diagnostics.entries().to_vec()
    }

    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        self.state_mut().diagnostics.take()
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// A registered component definition.
#[derive(Clone)]
pub struct ComponentHandle {
    scope: Weak<ScopeInner>,
    scope_id: u64,
    pub(crate) key: DefinitionKey,
    pub(crate) id: String,
    proto: Rc<ComponentDefinition>,
}

impl ComponentHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The definition exactly as declared, without inherited parts.
    pub fn proto(&self) -> &ComponentDefinition {
        &self.proto
    }

    /// Start a tag for one occurrence of this component.
    pub fn create_tag(&self) -> Tag {
        Tag::new(self.clone())
    }

    pub(crate) fn definition_ref(&self) -> DefinitionRef {
        DefinitionRef {
            scope_id: self.scope_id,
            key: self.key,
        }
    }

    pub(crate) fn scope(&self) -> Option<Scope> {
        self.scope.upgrade().map(|inner| Scope { inner })
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("scope_id", &self.scope_id)
            .field("id", &self.id)
            .finish()
    }
}

/// A registered Data entry.
#[derive(Debug, Clone)]
pub struct DataHandle {
    scope: Weak<ScopeInner>,
    scope_id: u64,
    id: String,
}

impl DataHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scope_id(&self) -> u64 {
        self.scope_id
    }

    /// Current value. `None` once the scope is gone.
    pub fn value(&self) -> Option<Props> {
        let inner = self.scope.upgrade()?;
        Scope { inner }.data_value(&self.id)
    }

    pub fn get_prop(&self, path: &str) -> Option<Value> {
        let inner = self.scope.upgrade()?;
        Scope { inner }.read_data(&self.id, &self.id, path)
    }
}

/// A registered Modifier.
#[derive(Clone)]
pub struct ModifierHandle {
    scope: Weak<ScopeInner>,
    scope_id: u64,
    id: String,
    proto: Rc<ModifierDefinition>,
}

impl ModifierHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scope_id(&self) -> u64 {
        self.scope_id
    }

    /// The modifier exactly as declared, without inherited methods.
    pub fn proto(&self) -> &ModifierDefinition {
        &self.proto
    }

    /// Call a method, inherited ones included.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, ScopeError> {
        let inner = self.scope.upgrade().ok_or(ScopeError::ScopeDropped)?;
        Ok(Scope { inner }.call_modifier(&self.id, name, args))
    }
}

impl fmt::Debug for ModifierHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifierHandle")
            .field("scope_id", &self.scope_id)
            .field("id", &self.id)
            .finish()
    }
}
