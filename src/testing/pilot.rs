//! Pilot: programmatic interaction with a headless scope.
//!
//! The `Pilot` owns a [`Scope`] and a host element, mounts markup into the
//! host, and simulates what a browser would do: dispatch events on elements
//! found by selector, and let debounce timers elapse.

use std::time::Duration;

use serde_json::Value;

use crate::config::ScopeConfig;
use crate::dom::{ElementId, SelectorError};
use crate::error::{Diagnostic, ScopeError};
use crate::registry::InstanceId;
use crate::scope::Scope;
use crate::value::Props;

use super::snapshot::tree_to_string;

// ---------------------------------------------------------------------------
// Pilot
// ---------------------------------------------------------------------------

/// A headless scope driver for testing.
///
/// # Examples
///
/// ```ignore
/// use sepcon::testing::Pilot;
///
/// let pilot = Pilot::new();
/// let counter = pilot.scope().create_component(definition)?;
/// pilot.mount(&counter.create_tag().render())?;
/// pilot.click("button.inc")?;
/// ```
pub struct Pilot {
    scope: Scope,
    host: ElementId,
}

impl Default for Pilot {
    fn default() -> Self {
        Self::new()
    }
}

impl Pilot {
    /// A pilot over a scope with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ScopeConfig::default())
    }

    pub fn with_config(config: ScopeConfig) -> Self {
        let scope = Scope::with_config(config);
        let host = scope.create_element("div");
        Self { scope, host }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The element markup is mounted into.
    pub fn host(&self) -> ElementId {
        self.host
    }

    // ── Mounting ─────────────────────────────────────────────────────

    /// Replace the host's content with `html` and flush.
    pub fn mount(&self, html: &str) -> Result<(), ScopeError> {
        self.scope.set_inner_html(self.host, html)
    }

    /// Empty the host, destroying every mounted component.
    pub fn unmount(&self) -> Result<(), ScopeError> {
        self.scope.set_inner_html(self.host, "")
    }

    // ── Input simulation ─────────────────────────────────────────────

    /// Dispatch `event` on every element under the host matching `selector`.
    ///
    /// Returns how many elements received it.
    pub fn dispatch(&self, selector: &str, event: &str, detail: Value) -> Result<usize, SelectorError> {
        let targets = self.scope.document().query_selector_all(self.host, selector)?;
        let mut delivered = 0;
        for target in targets {
            if self.scope.dispatch(target, event, detail.clone()).is_ok() {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Simulate a click on every match of `selector`.
    pub fn click(&self, selector: &str) -> Result<usize, SelectorError> {
        self.dispatch(selector, "click", Value::Null)
    }

    // ── Processing ───────────────────────────────────────────────────

    /// Run every queued sequence.
    pub fn flush(&self) {
        self.scope.flush();
    }

    /// Let the clock run `duration`, then fire due timers.
    ///
    /// Meant for tests on tokio's paused clock.
    pub async fn advance(&self, duration: Duration) {
        tokio::time::advance(duration).await;
        self.scope.tick();
    }

    /// Run until no sequence is queued and no timer is pending.
    pub async fn settle(&self) {
        self.scope.run_until_idle().await;
    }

    // ── Query ────────────────────────────────────────────────────────

    pub fn instance(&self, identifier: &str) -> Option<InstanceId> {
        self.scope.instance_by_identifier(identifier)
    }

    /// Flattened props of the instance with `identifier`.
    pub fn props(&self, identifier: &str) -> Option<Props> {
        self.instance(identifier)
            .and_then(|id| self.scope.props_of(id))
    }

    /// Current rendered HTML of the instance with `identifier`.
    pub fn html(&self, identifier: &str) -> Option<String> {
        self.instance(identifier).and_then(|id| self.scope.html_of(id))
    }

    /// Outline of the element tree under the host.
    pub fn tree(&self) -> String {
        tree_to_string(&self.scope.document(), self.host)
    }

    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        self.scope.take_diagnostics()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
