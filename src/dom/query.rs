//! Document queries: selector matching, id lookup, generic predicates.

use super::node::{Element, ElementId};
use super::selector::{SelectorError, SelectorList};
use super::tree::Document;

impl Document {
    /// All descendants of `root` matching `selector`, in document order.
    ///
    /// `root` itself is never part of the result.
    pub fn query_selector_all(
        &self,
        root: ElementId,
        selector: &str,
    ) -> Result<Vec<ElementId>, SelectorError> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select_all(root, &list))
    }

    /// First descendant of `root` matching `selector`.
    pub fn query_selector(
        &self,
        root: ElementId,
        selector: &str,
    ) -> Result<Option<ElementId>, SelectorError> {
        let list = SelectorList::parse(selector)?;
        Ok(self
            .descendants(root)
            .into_iter()
            .find(|&id| list.matches(self, id)))
    }

    /// [`Document::query_selector_all`] with a pre-parsed list.
    pub fn select_all(&self, root: ElementId, list: &SelectorList) -> Vec<ElementId> {
        self.descendants(root)
            .into_iter()
            .filter(|&id| list.matches(self, id))
            .collect()
    }

    /// Find the first element whose `id` attribute matches.
    ///
    /// Iterates the whole arena, in slotmap order.
    pub fn query_by_id(&self, id: &str) -> Option<ElementId> {
        self.elements
            .iter()
            .find(|(_, el)| el.id() == Some(id))
            .map(|(element_id, _)| element_id)
    }

    /// Find all elements matching an arbitrary predicate.
    pub fn query_all(&self, predicate: impl Fn(&Element) -> bool) -> Vec<ElementId> {
        self.elements
            .iter()
            .filter(|(_, el)| predicate(el))
            .map(|(element_id, _)| element_id)
            .collect()
    }
}
