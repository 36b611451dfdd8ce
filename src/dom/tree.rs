//! Document tree: create, append, remove, walk, listeners.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use slotmap::{SecondaryMap, SlotMap};

use super::node::{Element, ElementId, ListenerId};
use super::parse::{parse_fragment, ParsedNode};

/// Empty slice constant for returning when an element has no children.
const EMPTY_CHILDREN: &[ElementId] = &[];

/// A listener callback.
pub type Listener = Rc<dyn Fn(&DomEvent)>;

/// An event travelling through the document.
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent {
    /// Event name, e.g. `"click"`.
    pub name: String,
    /// Element the event was dispatched on.
    pub target: ElementId,
    /// Element whose listener is currently running.
    pub current_target: ElementId,
    /// Arbitrary payload.
    pub detail: Value,
}

struct ListenerEntry {
    element: ElementId,
    event: String,
    callback: Listener,
}

/// The in-memory document, backed by a slotmap arena.
///
/// Elements live in a single `SlotMap`. Parent/child relationships are stored
/// in secondary maps so removal is O(subtree size) and lookup is O(1).
/// Listeners are owned by the document and die with their element.
pub struct Document {
    pub(crate) elements: SlotMap<ElementId, Element>,
    children: SecondaryMap<ElementId, Vec<ElementId>>,
    parent: SecondaryMap<ElementId, ElementId>,
    listeners: SlotMap<ListenerId, ListenerEntry>,
    by_element: SecondaryMap<ElementId, Vec<ListenerId>>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self {
            elements: SlotMap::with_key(),
            children: SecondaryMap::new(),
            parent: SecondaryMap::new(),
            listeners: SlotMap::with_key(),
            by_element: SecondaryMap::new(),
        }
    }

    /// Insert a detached element and materialize its initial content.
    pub fn create_element(&mut self, element: Element) -> ElementId {
        let html = element.inner_html().to_owned();
        let id = self.elements.insert(element);
        self.children.insert(id, Vec::new());
        let parsed = parse_fragment(&html);
        let mut created = Vec::new();
        self.materialize(id, &parsed, &mut created);
        id
    }

    /// Insert `element` as the last child of `parent`.
    ///
    /// Returns `None` if `parent` does not exist.
    pub fn append_child(&mut self, parent: ElementId, element: Element) -> Option<ElementId> {
        if !self.elements.contains_key(parent) {
            return None;
        }
        let id = self.create_element(element);
        self.parent.insert(id, parent);
        if let Some(siblings) = self.children.get_mut(parent) {
            siblings.push(id);
        }
        Some(id)
    }

    /// Remove an element and all its descendants, dropping their listeners.
    ///
    /// Returns the removed element, or `None` if it didn't exist.
    pub fn remove(&mut self, id: ElementId) -> Option<Element> {
        if !self.elements.contains_key(id) {
            return None;
        }
        if let Some(parent_id) = self.parent.remove(id) {
            if let Some(siblings) = self.children.get_mut(parent_id) {
                siblings.retain(|&child| child != id);
            }
        }
        let mut removed = None;
        for current in self.subtree(id) {
            self.children.remove(current);
            self.parent.remove(current);
            if let Some(listener_ids) = self.by_element.remove(current) {
                for listener in listener_ids {
                    self.listeners.remove(listener);
                }
            }
            let element = self.elements.remove(current);
            if current == id {
                removed = element;
            }
        }
        removed
    }

    /// Replace the content of `id`.
    ///
    /// Existing child elements are removed (their listeners with them), the
    /// markup is stored, and the new child elements are returned in document
    /// order. Returns an empty vec if `id` does not exist.
    pub fn set_inner_html(&mut self, id: ElementId, html: &str) -> Vec<ElementId> {
        let Some(element) = self.elements.get_mut(id) else {
            return Vec::new();
        };
        element.set_inner_html(html);
        for child in self.children(id).to_vec() {
            self.remove(child);
        }
        let parsed = parse_fragment(html);
        let mut created = Vec::new();
        self.materialize(id, &parsed, &mut created);
        created
    }

    fn materialize(&mut self, parent: ElementId, nodes: &[ParsedNode], created: &mut Vec<ElementId>) {
        for node in nodes {
            let mut element = Element::new(node.tag.clone()).with_original_html(node.inner_html.clone());
            for (name, value) in &node.attributes {
                element.set_attribute(name.clone(), value.clone());
            }
            let id = self.elements.insert(element);
            self.children.insert(id, Vec::new());
            self.parent.insert(id, parent);
            if let Some(siblings) = self.children.get_mut(parent) {
                siblings.push(id);
            }
            created.push(id);
            self.materialize(id, &node.children, created);
        }
    }

    /// Get the parent of an element, if it has one.
    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.parent.get(id).copied()
    }

    /// Children of an element. Empty if it has none or does not exist.
    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.children
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_CHILDREN)
    }

    /// Walk from `id` up to the top, collecting ancestor ids.
    ///
    /// Does **not** include `id` itself; starts with the immediate parent.
    pub fn ancestors(&self, id: ElementId) -> Vec<ElementId> {
        let mut result = Vec::new();
        let mut current = id;
        while let Some(p) = self.parent.get(current).copied() {
            result.push(p);
            current = p;
        }
        result
    }

    /// Pre-order traversal of the subtree rooted at `start`, inclusive.
    pub fn subtree(&self, start: ElementId) -> Vec<ElementId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.elements.contains_key(current) {
                continue;
            }
            result.push(current);
            for &child in self.children(current).iter().rev() {
                stack.push(child);
            }
        }
        result
    }

    /// Pre-order descendants of `start`, excluding `start`.
    pub fn descendants(&self, start: ElementId) -> Vec<ElementId> {
        let mut all = self.subtree(start);
        if !all.is_empty() {
            all.remove(0);
        }
        all
    }

    /// The bubble path: `[start, parent, ..., top]`.
    ///
    /// Empty if `start` does not exist.
    pub fn bubble_path(&self, start: ElementId) -> Vec<ElementId> {
        if !self.contains(start) {
            return Vec::new();
        }
        let mut path = vec![start];
        path.extend(self.ancestors(start));
        path
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id)
    }

    /// Current markup of an element.
    pub fn inner_html(&self, id: ElementId) -> Option<&str> {
        self.elements.get(id).map(Element::inner_html)
    }

    pub fn attribute(&self, id: ElementId, name: &str) -> Option<&str> {
        self.elements.get(id).and_then(|el| el.attribute(name))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(id)
    }

    // -- listeners ----------------------------------------------------------

    /// Attach a listener. Returns `None` if the element does not exist.
    pub fn add_event_listener(
        &mut self,
        element: ElementId,
        event: impl Into<String>,
        callback: Listener,
    ) -> Option<ListenerId> {
        if !self.elements.contains_key(element) {
            return None;
        }
        let id = self.listeners.insert(ListenerEntry {
            element,
            event: event.into(),
            callback,
        });
        match self.by_element.get_mut(element) {
            Some(list) => list.push(id),
            None => {
                self.by_element.insert(element, vec![id]);
            }
        }
        Some(id)
    }

    /// Detach a listener. Returns whether it was still attached.
    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        let Some(entry) = self.listeners.remove(id) else {
            return false;
        };
        if let Some(list) = self.by_element.get_mut(entry.element) {
            list.retain(|&l| l != id);
        }
        true
    }

    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.listeners.contains_key(id)
    }

    /// Number of listeners on `element`, optionally filtered by event name.
    pub fn listener_count(&self, element: ElementId, event: Option<&str>) -> usize {
        self.by_element.get(element).map_or(0, |list| {
            list.iter()
                .filter_map(|&l| self.listeners.get(l))
                .filter(|entry| event.map_or(true, |name| entry.event == name))
                .count()
        })
    }

    /// Callbacks registered on `element` for `event`, in registration order.
    pub fn listeners(&self, element: ElementId, event: &str) -> Vec<(ListenerId, Listener)> {
        self.by_element.get(element).map_or_else(Vec::new, |list| {
            list.iter()
                .filter_map(|&l| self.listeners.get(l).map(|entry| (l, entry)))
                .filter(|(_, entry)| entry.event == event)
                .map(|(l, entry)| (l, Rc::clone(&entry.callback)))
                .collect()
        })
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("elements", &self.elements.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
