//! Orchestration: binding instances to elements and running their sequences.
//!
//! Every function here follows the same discipline: borrow the scope state,
//! copy out what is needed, release the borrow, then run user code.

use std::rc::Rc;

use crate::change::{diff, ChangeSet};
use crate::component::{ComponentInstance, Ctx};
use crate::definition::ComponentDefinition;
use crate::dom::ElementId;
use crate::error::Diagnostic;
use crate::registry::InstanceId;
use crate::scope::{RenderFrame, Scope, ScopeState};
use crate::sequence::{FollowUp, Phase, SequenceJob, SequenceName, SequenceStatus, Step};
use crate::state::StateStore;
use crate::tag::{IDENTIFIER_ATTRIBUTE, TAG_PREFIX};
use crate::value::into_props;

/// Pops the render frame pushed for one render call, also on unwind.
struct RenderFrameGuard<'a> {
    scope: &'a Scope,
}

impl<'a> RenderFrameGuard<'a> {
    fn push(scope: &'a Scope, owner: &str) -> Self {
        scope.state_mut().render_stack.push(RenderFrame {
            owner: owner.to_owned(),
            ordinals: Default::default(),
        });
        Self { scope }
    }
}

impl Drop for RenderFrameGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.scope.inner.state.try_borrow_mut() {
            state.render_stack.pop();
        }
    }
}

impl Scope {
    // -- sequences --------------------------------------------------------------

    /// Run one job to completion, follow-up included.
    pub(crate) fn run_job(&self, mut job: SequenceJob) {
        let span = tracing::debug_span!("sequence", name = %job.name);
        let _entered = span.enter();

        let looked_up = {
            let state = self.state();
            state.registry.get(job.instance).and_then(|instance| {
                state
                    .definitions
                    .resolved(instance.definition)
                    .map(|def| (instance.active, instance.phase, instance.identifier.clone(), def))
            })
        };
        let Some((active, phase, identifier, definition)) = looked_up else {
            job.complete(SequenceStatus::Skipped);
            return;
        };
        let runnable = match job.name {
            // Only the destroy of an instance that stayed destroyed.
            SequenceName::Destroy => !active,
            // Mount runs once per mount, never twice for a doubled connect.
            SequenceName::Mount => active && matches!(phase, Phase::Idle | Phase::Destroyed),
            _ => active,
        };
        if !runnable {
            tracing::trace!(target: "sepcon", component = %identifier, "sequence skipped");
            job.complete(SequenceStatus::Skipped);
            return;
        }

        let is_destroy = job.name == SequenceName::Destroy;
        self.set_phase(job.instance, Phase::during(job.name));
        let ctx = Ctx::new(self.clone(), job.instance, job.origin.clone());
        let mut status = SequenceStatus::Completed { rendered: false };
        let mut rendered = false;
        for step in self.inner.config.sequences.steps(job.name) {
            match *step {
                Step::Hook(layer, hook) => {
                    if let Some(f) = definition.hook(layer, hook) {
                        f(&ctx, &job.changes);
                    }
                }
                Step::Change { veto } => {
                    if let Some(f) = definition.change_fn() {
                        let proceed = f(&ctx, &job.changes);
                        if veto && !proceed {
                            status = SequenceStatus::Vetoed;
                            break;
                        }
                    }
                }
                Step::Render => {
                    rendered |= self.render_step(job.instance, &identifier, &definition, &ctx, &job.changes);
                }
            }
            if !is_destroy && !self.is_active(job.instance) {
                break;
            }
        }
        if status != SequenceStatus::Vetoed {
            status = SequenceStatus::Completed { rendered };
        }

        let still_active = self.is_active(job.instance);
        if is_destroy || still_active {
            self.set_phase(job.instance, Phase::after(job.name));
        }
        match job.follow_up {
            FollowUp::None => {}
            FollowUp::RepairHtml => {
                if still_active {
                    self.repair(job.instance);
                }
            }
            FollowUp::Purge => {
                if !still_active {
                    self.purge(job.instance, true);
                }
            }
        }
        // Children that reference props catch up after a local render.
        if job.name == SequenceName::LocalChange && still_active {
            self.cascade_references(job.instance);
        }
        tracing::debug!(target: "sepcon", component = %identifier, ?status, "sequence settled");
        job.complete(status);
    }

    fn render_step(
        &self,
        instance: InstanceId,
        identifier: &str,
        definition: &ComponentDefinition,
        ctx: &Ctx,
        changes: &ChangeSet,
    ) -> bool {
        let html = match definition.render_fn() {
            Some(render) => {
                let _frame = RenderFrameGuard::push(self, identifier);
                render(ctx, changes)
            }
            None => None,
        };
        self.on_render(instance, html)
    }

    /// Apply a render result. Returns whether new HTML went in.
    pub(crate) fn on_render(&self, instance: InstanceId, html: Option<String>) -> bool {
        let target = {
            let state = self.state();
            let Some(inst) = state.registry.get(instance) else {
                return false;
            };
            match html.filter(|h| !h.is_empty()) {
                Some(h) if inst.current_html.as_deref() != Some(h.as_str()) => {
                    Some((inst.element, h))
                }
                _ => None,
            }
        };
        let Some((element, html)) = target else {
            self.repair(instance);
            return false;
        };
        if let Some(inst) = self.state_mut().registry.get_mut(instance) {
            inst.current_html = Some(html.clone());
        }
        self.apply_inner_html(element, &html);
        self.bind_events(instance);
        self.notify_descendant_change(instance);
        true
    }

    /// Re-apply the current HTML if the element no longer shows it.
    pub(crate) fn repair(&self, instance: InstanceId) {
        let (target, bound) = {
            let state = self.state();
            let Some(inst) = state.registry.get(instance) else {
                return;
            };
            if !inst.active {
                return;
            }
            let shown = state.document.inner_html(inst.element);
            let target = match (&inst.current_html, shown) {
                (Some(current), Some(shown)) if current != shown => {
                    Some((inst.element, current.clone()))
                }
                _ => None,
            };
            (target, inst.events_bound)
        };
        match target {
            Some((element, html)) => {
                tracing::debug!(target: "sepcon", "repairing component html");
                self.apply_inner_html(element, &html);
                self.bind_events(instance);
            }
            None if !bound => self.bind_events(instance),
            None => {}
        }
    }

    /// Every ancestor hears that `instance` applied new HTML.
    fn notify_descendant_change(&self, instance: InstanceId) {
        let (origin, ancestors) = {
            let state = self.state();
            let Some(inst) = state.registry.get(instance) else {
                return;
            };
            let ancestors: Vec<InstanceId> = state
                .registry
                .ancestors(instance)
                .into_iter()
                .filter(|&a| state.registry.get(a).is_some_and(|i| i.active))
                .collect();
            (inst.identifier.clone(), ancestors)
        };
        for ancestor in ancestors {
            self.enqueue(
                SequenceJob::new(ancestor, SequenceName::DescendantChange).with_origin(origin.clone()),
            );
        }
    }

    fn set_phase(&self, instance: InstanceId, phase: Phase) {
        if let Some(inst) = self.state_mut().registry.get_mut(instance) {
            inst.phase = phase;
        }
    }

    // -- markup -----------------------------------------------------------------

    /// Destroy the components inside `element`, replace its content, and
    /// connect the components the new markup contains.
    pub(crate) fn apply_inner_html(&self, element: ElementId, html: &str) {
        let doomed: Vec<InstanceId> = {
            let state = self.state();
            state
                .document
                .descendants(element)
                .into_iter()
                .filter_map(|el| state.registry.by_element(el))
                .collect()
        };
        for instance in doomed {
            self.destroy_instance(instance);
        }
        let created = self.state_mut().document.set_inner_html(element, html);
        self.connect_elements(&created);
    }

    /// Bind component elements among `created` to instances.
    fn connect_elements(&self, created: &[ElementId]) {
        for &element in created {
            let found = {
                let state = self.state();
                state.document.get(element).and_then(|el| {
                    if !el.tag.starts_with(TAG_PREFIX) {
                        return None;
                    }
                    el.attribute(IDENTIFIER_ATTRIBUTE)
                        .map(|id| (id.to_owned(), el.original_inner_html().to_owned()))
                })
            };
            let Some((identifier, original_html)) = found else {
                continue;
            };
            // An ancestor connected earlier in this batch may already have
            // replaced this element.
            if !self.state().document.contains(element) {
                continue;
            }

            let existing = {
                let state = self.state();
                state
                    .registry
                    .by_identifier(&identifier)
                    .and_then(|id| state.registry.get(id).map(|i| (id, i.active, i.element)))
            };
            match existing {
                Some((_, true, bound)) => {
                    if bound != element {
                        self.report(Diagnostic::DuplicateMount { identifier });
                    }
                }
                Some((instance, false, _)) => self.resume(instance, element, original_html),
                None => self.create_instance(element, identifier, original_html),
            }
        }
    }

    fn create_instance(&self, element: ElementId, identifier: String, original_html: String) {
        let created = {
            let mut state = self.state_mut();
            let ScopeState {
                document,
                registry,
                definitions,
                tags,
                ..
            } = &mut *state;
            tags.get(&identifier).and_then(|record| {
                let definition = definitions.resolved(record.definition)?;
                let parent = document
                    .ancestors(element)
                    .into_iter()
                    .find_map(|el| registry.by_element(el));
                let instance = ComponentInstance::new(
                    identifier.clone(),
                    record.definition,
                    record.explicit_id,
                    element,
                    original_html,
                    StateStore::from_definition(&definition),
                );
                Some(registry.insert(instance, parent))
            })
        };
        match created {
            Some(instance) => {
                tracing::debug!(target: "sepcon", component = %identifier, "component connected");
                self.initialize(instance);
            }
            None => self.report(Diagnostic::UnknownTag { identifier }),
        }
    }

    // -- lifecycle entry points -------------------------------------------------

    /// Activate, pull state and queue `mount`.
    pub(crate) fn initialize(&self, instance: InstanceId) {
        if let Some(inst) = self.state_mut().registry.get_mut(instance) {
            inst.active = true;
        }
        self.set_state_data(instance);
        self.enqueue(SequenceJob::new(instance, SequenceName::Mount));
    }

    /// Install externals, resolve referenced and global props and register
    /// routes. Returns the referenced-prop changes.
    pub(crate) fn set_state_data(&self, instance: InstanceId) -> ChangeSet {
        let mut diagnostics = Vec::new();
        let changes = {
            let mut state = self.state_mut();
            let ScopeState {
                registry,
                globals,
                tags,
                ..
            } = &mut *state;
            let parent_props = registry
                .parent(instance)
                .and_then(|p| registry.get(p))
                .map(|p| p.state.flatten())
                .unwrap_or_default();
            let Some(inst) = registry.get_mut(instance) else {
                return ChangeSet::new();
            };
            let externals = tags
                .get(&inst.identifier)
                .map(|record| record.externals.clone())
                .unwrap_or_default();
            for conflict in inst.state.set_externals(&externals) {
                diagnostics.push(Diagnostic::PartitionConflict {
                    component: inst.identifier.clone(),
                    name: conflict.name,
                    kept: conflict.kept,
                    dropped: conflict.dropped,
                });
            }
            let changes = inst.state.update_referenced(&parent_props);
            // Global writes made while detached are picked up without a sequence.
            let (_, unknown) = inst.state.update_global(globals);
            for data in unknown {
                diagnostics.push(Diagnostic::UnknownData {
                    owner: inst.identifier.clone(),
                    data,
                });
            }
            inst.state.add_routes(instance, globals);
            changes
        };
        for diagnostic in diagnostics {
            self.report(diagnostic);
        }
        changes
    }

    /// Re-attach an inactive instance to `element`.
    ///
    /// Moved references queue their own `referenceChange` first. Then
    /// changed externals or original content run `externalChange`, anything
    /// else runs `resume`.
    pub(crate) fn resume(&self, instance: InstanceId, element: ElementId, original_html: String) {
        let parent = {
            let state = self.state();
            state
                .document
                .ancestors(element)
                .into_iter()
                .find_map(|el| state.registry.by_element(el))
        };
        let (never_mounted, html_changed) = {
            let mut state = self.state_mut();
            state.registry.attach_element(instance, element);
            state.registry.set_parent(instance, parent);
            let Some(inst) = state.registry.get_mut(instance) else {
                return;
            };
            inst.active = true;
            let html_changed = inst.original_html != original_html;
            inst.original_html = original_html;
            (inst.phase == Phase::Idle, html_changed)
        };
        self.unbind_events(instance);
        if never_mounted {
            self.initialize(instance);
            return;
        }
        tracing::debug!(target: "sepcon", "component resumed");

        let references = self.set_state_data(instance);
        let externals = {
            let state = self.state();
            state.registry.get(instance).map(|inst| {
                let previous = inst.prev_external.clone().unwrap_or_default();
                diff(&previous, &inst.state.external_snapshot())
            })
        };
        let externals = externals.unwrap_or_default();
        // Restores child markup now, so children resume instead of remounting.
        self.repair(instance);

        if !references.is_empty() {
            self.enqueue(
                SequenceJob::new(instance, SequenceName::ReferenceChange)
                    .with_changes(references)
                    .with_follow_up(FollowUp::RepairHtml),
            );
        }
        let job = if html_changed || !externals.is_empty() {
            SequenceJob::new(instance, SequenceName::ExternalChange).with_changes(externals)
        } else {
            SequenceJob::new(instance, SequenceName::Resume)
        };
        self.enqueue(job.with_follow_up(FollowUp::RepairHtml));
    }

    /// Deactivate `instance` and queue its `destroy` sequence.
    ///
    /// Routes, debounce timer and listeners go synchronously; nothing fires
    /// against the instance after this returns.
    pub(crate) fn destroy_instance(&self, instance: InstanceId) {
        let found = {
            let mut state = self.state_mut();
            let ScopeState {
                registry,
                globals,
                scheduler,
                ..
            } = &mut *state;
            let Some(inst) = registry.get_mut(instance) else {
                return;
            };
            if !inst.active {
                return;
            }
            inst.active = false;
            inst.prev_external = Some(inst.state.external_snapshot());
            inst.state.remove_routes(instance, globals);
            scheduler.cancel(instance);
            (inst.phase, inst.explicit_id)
        };
        let (phase, explicit_id) = found;
        self.unbind_events(instance);
        self.state_mut().registry.detach_element(instance);
        tracing::debug!(target: "sepcon", "component destroyed");

        if phase == Phase::Idle {
            // Never mounted: nothing to tear down.
            if !explicit_id {
                self.purge(instance, false);
            }
            return;
        }
        let follow_up = if explicit_id {
            FollowUp::None
        } else {
            FollowUp::Purge
        };
        self.enqueue(SequenceJob::new(instance, SequenceName::Destroy).with_follow_up(follow_up));
    }

    /// Drop `instance` from the registry. A purge inside a render keeps the
    /// tag record, which the new markup may still need.
    fn purge(&self, instance: InstanceId, forget_tag: bool) {
        let mut state = self.state_mut();
        if let Some(inst) = state.registry.remove(instance) {
            if forget_tag {
                state.tags.remove(&inst.identifier);
            }
        }
    }

    // -- state changes ----------------------------------------------------------

    /// Merge `patch` into local state and queue `localChange`.
    ///
    /// With `propagate`, referencing descendants are re-resolved first, so
    /// their `referenceChange` runs before this instance re-renders.
    pub(crate) fn set_local_props(
        &self,
        instance: InstanceId,
        patch: serde_json::Value,
        propagate: bool,
    ) -> ChangeSet {
        let Some(patch) = into_props(patch) else {
            tracing::warn!(target: "sepcon", "prop patch is not an object");
            return ChangeSet::new();
        };
        let result = {
            let mut state = self.state_mut();
            state.registry.get_mut(instance).map(|inst| {
                let (changes, rejected) = inst.state.set_local(&patch);
                (inst.identifier.clone(), changes, rejected)
            })
        };
        let Some((identifier, changes, rejected)) = result else {
            return ChangeSet::new();
        };
        for (name, partition) in rejected {
            self.report(Diagnostic::ForeignWrite {
                component: identifier.clone(),
                name,
                partition,
            });
        }
        if changes.is_empty() || !self.is_active(instance) {
            return changes;
        }
        if propagate {
            self.cascade_references(instance);
        }
        self.enqueue(
            SequenceJob::new(instance, SequenceName::LocalChange)
                .with_changes(changes.clone())
                .with_follow_up(FollowUp::RepairHtml),
        );
        self.flush();
        changes
    }

    /// Re-resolve referenced props of every active child, recursively, and
    /// queue `referenceChange` where something moved.
    pub(crate) fn cascade_references(&self, instance: InstanceId) {
        let found = {
            let state = self.state();
            state.registry.get(instance).map(|inst| {
                (
                    inst.state.flatten(),
                    state.registry.children(instance).to_vec(),
                )
            })
        };
        let Some((parent_props, children)) = found else {
            return;
        };
        for child in children {
            let changes = {
                let mut state = self.state_mut();
                match state.registry.get_mut(child) {
                    Some(inst) if inst.active && inst.state.has_references() => {
                        inst.state.update_referenced(&parent_props)
                    }
                    _ => continue,
                }
            };
            if changes.is_empty() {
                continue;
            }
            self.enqueue(
                SequenceJob::new(child, SequenceName::ReferenceChange)
                    .with_changes(changes)
                    .with_follow_up(FollowUp::RepairHtml),
            );
            self.cascade_references(child);
        }
    }

    /// The resolved definition of `instance`.
    pub(crate) fn definition_of(&self, instance: InstanceId) -> Option<Rc<ComponentDefinition>> {
        let state = self.state();
        let key = state.registry.get(instance)?.definition;
        state.definitions.resolved(key)
    }
}
