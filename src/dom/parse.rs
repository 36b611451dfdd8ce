//! Tolerant HTML fragment parser.
//!
//! Turns a markup string into a forest of [`ParsedNode`]s so the document can
//! materialize child elements for selector queries and component tags. Text
//! and comments are skipped; only elements and their attributes survive.
//! Each node remembers the raw markup between its open and close tags.

/// Elements that never have content.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// One parsed element.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedNode {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    /// Raw markup between the open and close tag.
    pub inner_html: String,
    pub children: Vec<ParsedNode>,
}

/// Parse a markup fragment into top-level nodes.
///
/// Unmatched close tags are ignored; unclosed elements end where their
/// parent ends (or at end of input).
pub fn parse_fragment(src: &str) -> Vec<ParsedNode> {
    let bytes = src.as_bytes();
    let len = bytes.len();
    let mut roots: Vec<ParsedNode> = Vec::new();
    // (node, byte offset where its content starts)
    let mut stack: Vec<(ParsedNode, usize)> = Vec::new();
    let mut i = 0;

    while i < len {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }

        if src[i..].starts_with("<!--") {
            i = match src[i + 4..].find("-->") {
                Some(end) => i + 4 + end + 3,
                None => len,
            };
            continue;
        }

        if i + 1 < len && bytes[i + 1] == b'/' {
            let close_start = i;
            let end = src[i..].find('>').map(|e| i + e).unwrap_or(len);
            let name = src[i + 2..end].trim().to_ascii_lowercase();
            i = (end + 1).min(len);
            if let Some(depth) = stack.iter().rposition(|(node, _)| node.tag == name) {
                while stack.len() > depth {
                    let Some((mut node, start)) = stack.pop() else {
                        break;
                    };
                    node.inner_html = src[start..close_start].to_owned();
                    attach(&mut stack, &mut roots, node);
                }
            }
            continue;
        }

        if i + 1 < len && bytes[i + 1].is_ascii_alphabetic() {
            let (node, after, self_closing) = parse_open_tag(src, i);
            i = after;
            if self_closing || VOID_ELEMENTS.contains(&node.tag.as_str()) {
                attach(&mut stack, &mut roots, node);
            } else {
                stack.push((node, after));
            }
            continue;
        }

        // A stray `<` in text.
        i += 1;
    }

    while let Some((mut node, start)) = stack.pop() {
        node.inner_html = src[start.min(len)..].to_owned();
        attach(&mut stack, &mut roots, node);
    }

    roots
}

fn attach(stack: &mut [(ParsedNode, usize)], roots: &mut Vec<ParsedNode>, node: ParsedNode) {
    match stack.last_mut() {
        Some((parent, _)) => parent.children.push(node),
        None => roots.push(node),
    }
}

/// Parse `<tag attr="v" ...>` starting at `start` (which points at `<`).
///
/// Returns the node, the offset just past `>`, and whether it was `/>`.
fn parse_open_tag(src: &str, start: usize) -> (ParsedNode, usize, bool) {
    let bytes = src.as_bytes();
    let len = bytes.len();
    let mut i = start + 1;

    let name_start = i;
    while i < len && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' && bytes[i] != b'/' {
        i += 1;
    }
    let mut node = ParsedNode {
        tag: src[name_start..i].to_ascii_lowercase(),
        ..ParsedNode::default()
    };

    let mut self_closing = false;
    loop {
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= len {
            return (node, len, self_closing);
        }
        match bytes[i] {
            b'>' => return (node, i + 1, self_closing),
            b'/' => {
                self_closing = true;
                i += 1;
                continue;
            }
            _ => {}
        }
        self_closing = false;

        let attr_start = i;
        while i < len
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        let name = src[attr_start..i].to_ascii_lowercase();
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let mut value = String::new();
        if i < len && bytes[i] == b'=' {
            i += 1;
            while i < len && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < len && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i] as char;
                let value_start = i + 1;
                let value_end = src[value_start..]
                    .find(quote)
                    .map(|e| value_start + e)
                    .unwrap_or(len);
                value = decode_entities(&src[value_start..value_end]);
                i = (value_end + 1).min(len);
            } else {
                let value_start = i;
                while i < len && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                value = decode_entities(&src[value_start..i]);
            }
        }

        if !name.is_empty() {
            node.attributes.push((name, value));
        }
    }
}

/// Escape a string for use inside a double-quoted attribute value.
pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_owned();
    }
    raw.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
