//! Structured diagnostic messages.
//!
//! A [`LogMessage`] is a title plus labelled rows. [`print`] renders it on a
//! single `tracing` event at `WARN` level under the `sepcon` target; it never
//! panics and never feeds back into control flow.

use std::fmt;

/// How a row should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStyle {
    /// A short caption for the row that follows.
    Label,
    /// Verbatim payload: ids, paths, snapshots.
    Code,
}

/// One row of a [`LogMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRow {
    pub style: RowStyle,
    pub content: String,
}

/// A diagnostic message: title and rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub title: String,
    pub rows: Vec<LogRow>,
}

impl LogMessage {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            rows: Vec::new(),
        }
    }

    /// Append a label row followed by a code row (builder).
    pub fn field(mut self, label: impl Into<String>, content: impl fmt::Display) -> Self {
        self.rows.push(LogRow {
            style: RowStyle::Label,
            content: label.into(),
        });
        self.rows.push(LogRow {
            style: RowStyle::Code,
            content: content.to_string(),
        });
        self
    }
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)?;
        for row in &self.rows {
            match row.style {
                RowStyle::Label => write!(f, "\n  {}:", row.content)?,
                RowStyle::Code => write!(f, "\n    {}", row.content)?,
            }
        }
        Ok(())
    }
}

/// Emit a message through `tracing`.
pub fn print(message: &LogMessage) {
    tracing::warn!(target: "sepcon", title = %message.title, "{message}");
}
