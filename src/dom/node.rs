//! Element types: ElementId, ListenerId, Element.

use std::collections::BTreeMap;

use slotmap::new_key_type;

new_key_type! {
    /// Unique identifier for a document element. Copy, lightweight (u64).
    pub struct ElementId;

    /// Identifies one registered event listener.
    pub struct ListenerId;
}

/// Data associated with a single element.
#[derive(Debug, Clone)]
pub struct Element {
    /// Lower-cased tag name (e.g. `"div"`, `"sc-counter"`).
    pub tag: String,
    attributes: BTreeMap<String, String>,
    classes: Vec<String>,
    /// Markup last assigned to this element.
    inner_html: String,
    /// Markup the element carried when it was created.
    original_inner_html: String,
}

impl Element {
    /// Create a new element with no attributes and no content.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            classes: Vec::new(),
            inner_html: String::new(),
            original_inner_html: String::new(),
        }
    }

    /// Set an attribute (builder).
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Set the initial content (builder). Also becomes the original snapshot.
    pub fn with_original_html(mut self, html: impl Into<String>) -> Self {
        let html = html.into();
        self.inner_html = html.clone();
        self.original_inner_html = html;
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Set an attribute. Writing `class` refreshes the class list.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        if name == "class" {
            self.classes = value.split_whitespace().map(str::to_owned).collect();
        }
        self.attributes.insert(name, value);
    }

    /// The `id` attribute, if any.
    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn inner_html(&self) -> &str {
        &self.inner_html
    }

    pub(crate) fn set_inner_html(&mut self, html: impl Into<String>) {
        self.inner_html = html.into();
    }

    /// Content snapshot taken at creation time.
    pub fn original_inner_html(&self) -> &str {
        &self.original_inner_html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_defaults() {
        let el = Element::new("DIV");
        assert_eq!(el.tag, "div");
        assert!(el.id().is_none());
        assert!(el.classes().is_empty());
        assert_eq!(el.inner_html(), "");
        assert_eq!(el.original_inner_html(), "");
    }

    #[test]
    fn class_attribute_populates_classes() {
        let el = Element::new("button").with_attribute("class", "btn  primary");
        assert!(el.has_class("btn"));
        assert!(el.has_class("primary"));
        assert!(!el.has_class("danger"));
    }

    #[test]
    fn attribute_names_are_case_insensitive_on_write() {
        let el = Element::new("x").with_attribute("Data-Sc-Id", "abc");
        assert_eq!(el.attribute("data-sc-id"), Some("abc"));
    }

    #[test]
    fn original_html_survives_content_updates() {
        let mut el = Element::new("x").with_original_html("<b>slot</b>");
        el.set_inner_html("<i>rendered</i>");
        assert_eq!(el.inner_html(), "<i>rendered</i>");
        assert_eq!(el.original_inner_html(), "<b>slot</b>");
    }

    #[test]
    fn ids_are_copy() {
        fn assert_copy<T: Copy>() {}
        assert_copy::<ElementId>();
        assert_copy::<ListenerId>();
    }
}
