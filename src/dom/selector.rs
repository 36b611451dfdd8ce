//! logos-based selector tokenizer, parser and matcher.
//!
//! Supports the subset components need for event targets: type, `*`,
//! `#id`, `.class`, `[attr]`, `[attr=value]`, compound selectors, the
//! descendant (whitespace) and child (`>`) combinators, and `,` lists.
//!
//! Token priority in logos is determined by:
//! 1. Longest match wins
//! 2. For equal length matches, earlier-defined variants win

use logos::Logos;

use super::node::{Element, ElementId};
use super::tree::Document;

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Selector token produced by the lexer.
#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Token {
    /// Whitespace is significant: it is the descendant combinator.
    #[regex(r"[ \t\n\r\f]+")]
    Whitespace,

    /// `#id`
    #[regex(r"#[a-zA-Z_][a-zA-Z0-9_-]*")]
    Id,

    /// `.class`
    #[regex(r"\.[a-zA-Z_][a-zA-Z0-9_-]*")]
    Class,

    /// Double-quoted string literal.
    #[regex(r#""[^"]*""#)]
    StringLiteral,

    /// Single-quoted string literal.
    #[regex(r"'[^']*'")]
    StringLiteralSingle,

    /// Tag names, attribute names and unquoted attribute values.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_-]*")]
    Ident,

    #[token("[")]
    BracketOpen,

    #[token("]")]
    BracketClose,

    #[token("=")]
    Equals,

    #[token(",")]
    Comma,

    #[token("*")]
    Star,

    #[token(">")]
    GreaterThan,
}

/// Errors from selector parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectorError {
    #[error("invalid character at byte {0}")]
    InvalidCharacter(usize),
    #[error("unexpected token {token:?} at byte {position}")]
    UnexpectedToken { position: usize, token: Token },
    #[error("empty selector")]
    Empty,
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// A single simple selector.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorComponent {
    Type(String),
    Universal,
    Class(String),
    Id(String),
    Attribute { name: String, value: Option<String> },
}

/// A combinator between compound selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// `A B`
    Descendant,
    /// `A > B`
    Child,
}

/// A chain of compound selectors joined by combinators.
///
/// `compounds[i]` is joined to `compounds[i + 1]` by `combinators[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub compounds: Vec<Vec<SelectorComponent>>,
    pub combinators: Vec<Combinator>,
}

/// A comma-separated selector list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList(pub Vec<Selector>);

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl SelectorList {
    /// Parse a selector list such as `".row > button.save, #reset"`.
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let mut tokens = Vec::new();
        for (result, span) in Token::lexer(input).spanned() {
            match result {
                Ok(token) => tokens.push((token, input[span.clone()].to_owned(), span.start)),
                Err(()) => return Err(SelectorError::InvalidCharacter(span.start)),
            }
        }

        let mut selectors = Vec::new();
        for group in tokens.split(|(t, _, _)| *t == Token::Comma) {
            selectors.push(parse_selector(group)?);
        }
        if selectors.is_empty() {
            return Err(SelectorError::Empty);
        }
        Ok(Self(selectors))
    }

    /// Whether any selector in the list matches `id`.
    pub fn matches(&self, document: &Document, id: ElementId) -> bool {
        self.0.iter().any(|s| matches_selector(s, document, id))
    }
}

fn parse_selector(tokens: &[(Token, String, usize)]) -> Result<Selector, SelectorError> {
    let mut compounds: Vec<Vec<SelectorComponent>> = Vec::new();
    let mut combinators: Vec<Combinator> = Vec::new();
    let mut current: Vec<SelectorComponent> = Vec::new();
    let mut pending: Option<Combinator> = None;
    let mut i = 0;

    let unexpected = |idx: usize| {
        let (token, _, position) = &tokens[idx];
        SelectorError::UnexpectedToken {
            position: *position,
            token: token.clone(),
        }
    };

    while i < tokens.len() {
        let (token, text, _) = &tokens[i];
        match token {
            Token::Whitespace => {
                if !current.is_empty() && pending.is_none() {
                    pending = Some(Combinator::Descendant);
                }
            }
            Token::GreaterThan => {
                if current.is_empty() && compounds.is_empty() {
                    return Err(unexpected(i));
                }
                pending = Some(Combinator::Child);
            }
            _ => {
                if let Some(combinator) = pending.take() {
                    if !current.is_empty() {
                        compounds.push(std::mem::take(&mut current));
                    }
                    combinators.push(combinator);
                }
                match token {
                    Token::Ident => current.push(SelectorComponent::Type(text.to_ascii_lowercase())),
                    Token::Star => current.push(SelectorComponent::Universal),
                    Token::Id => current.push(SelectorComponent::Id(text[1..].to_owned())),
                    Token::Class => current.push(SelectorComponent::Class(text[1..].to_owned())),
                    Token::BracketOpen => {
                        let (component, next) = parse_attribute(tokens, i + 1).ok_or_else(|| {
                            unexpected((i + 1).min(tokens.len() - 1))
                        })?;
                        current.push(component);
                        i = next;
                        continue;
                    }
                    _ => return Err(unexpected(i)),
                }
            }
        }
        i += 1;
    }

    if pending == Some(Combinator::Child) || current.is_empty() {
        if compounds.is_empty() && current.is_empty() {
            return Err(SelectorError::Empty);
        }
        if pending == Some(Combinator::Child) {
            return Err(SelectorError::Empty);
        }
    }
    if !current.is_empty() {
        compounds.push(current);
    }
    // A trailing descendant combinator (trailing whitespace) joins nothing.
    combinators.truncate(compounds.len().saturating_sub(1));
    Ok(Selector {
        compounds,
        combinators,
    })
}

/// Parse `name]` or `name=value]` starting right after `[`.
fn parse_attribute(
    tokens: &[(Token, String, usize)],
    start: usize,
) -> Option<(SelectorComponent, usize)> {
    let significant = |idx: usize| {
        let mut idx = idx;
        while idx < tokens.len() && tokens[idx].0 == Token::Whitespace {
            idx += 1;
        }
        idx
    };

    let i = significant(start);
    let (Token::Ident, name, _) = tokens.get(i)? else {
        return None;
    };
    let name = name.to_ascii_lowercase();
    let i = significant(i + 1);
    match tokens.get(i)? {
        (Token::BracketClose, _, _) => Some((SelectorComponent::Attribute { name, value: None }, i + 1)),
        (Token::Equals, _, _) => {
            let i = significant(i + 1);
            let value = match tokens.get(i)? {
                (Token::Ident, text, _) => text.clone(),
                (Token::StringLiteral | Token::StringLiteralSingle, text, _) => {
                    text[1..text.len() - 1].to_owned()
                }
                _ => return None,
            };
            let i = significant(i + 1);
            match tokens.get(i)? {
                (Token::BracketClose, _, _) => Some((
                    SelectorComponent::Attribute {
                        name,
                        value: Some(value),
                    },
                    i + 1,
                )),
                _ => None,
            }
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Match right to left: the last compound must match `id`, then each
/// combinator walks up the ancestor chain.
fn matches_selector(selector: &Selector, document: &Document, id: ElementId) -> bool {
    let Some(last) = selector.compounds.last() else {
        return false;
    };
    match document.get(id) {
        Some(el) if matches_compound(last, el) => {}
        _ => return false,
    }
    matches_from(selector, selector.compounds.len() - 1, document, id)
}

/// `compounds[idx]` already matched `node`; try to satisfy the rest leftwards.
fn matches_from(selector: &Selector, idx: usize, document: &Document, node: ElementId) -> bool {
    if idx == 0 {
        return true;
    }
    let compound = &selector.compounds[idx - 1];
    match selector.combinators[idx - 1] {
        Combinator::Child => match document.parent(node) {
            Some(parent) => {
                document.get(parent).is_some_and(|el| matches_compound(compound, el))
                    && matches_from(selector, idx - 1, document, parent)
            }
            None => false,
        },
        Combinator::Descendant => document.ancestors(node).into_iter().any(|ancestor| {
            document
                .get(ancestor)
                .is_some_and(|el| matches_compound(compound, el))
                && matches_from(selector, idx - 1, document, ancestor)
        }),
    }
}

fn matches_compound(compound: &[SelectorComponent], element: &Element) -> bool {
    compound.iter().all(|component| match component {
        SelectorComponent::Type(name) => element.tag == *name,
        SelectorComponent::Universal => true,
        SelectorComponent::Class(name) => element.has_class(name),
        SelectorComponent::Id(name) => element.id() == Some(name.as_str()),
        SelectorComponent::Attribute { name, value } => match (element.attribute(name), value) {
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
            (None, _) => false,
        },
    })
}
