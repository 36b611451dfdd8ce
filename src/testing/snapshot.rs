//! Snapshot helpers.
//!
//! Text renderings of the element tree, suitable for `insta` inline
//! snapshots and plain assertions.

use crate::dom::{Document, ElementId};

/// Render the element tree under `root` as an indented outline.
///
/// One element per line: the tag name, then its attributes in name order.
/// Children are indented by two spaces. The final line has no trailing
/// newline.
pub fn tree_to_string(doc: &Document, root: ElementId) -> String {
    let mut lines = Vec::new();
    outline(doc, root, 0, &mut lines);
    lines.join("\n")
}

fn outline(doc: &Document, id: ElementId, depth: usize, lines: &mut Vec<String>) {
    let Some(element) = doc.get(id) else {
        return;
    };
    let mut line = format!("{}{}", "  ".repeat(depth), element.tag);
    for (name, value) in element.attributes() {
        line.push_str(&format!(" {name}=\"{value}\""));
    }
    lines.push(line);
    for &child in doc.children(id) {
        outline(doc, child, depth + 1, lines);
    }
}
