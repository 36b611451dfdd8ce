//! In-memory document: slotmap-backed element arena with HTML fragment
//! parsing, selector queries, listeners and bubbling paths.

pub mod node;
pub mod parse;
pub mod query;
pub mod selector;
pub mod tree;

pub use node::{Element, ElementId, ListenerId};
pub use selector::{SelectorError, SelectorList};
pub use tree::{DomEvent, Document, Listener};
