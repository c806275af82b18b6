//! Error types for formula parsing.

use crate::span::Span;
use thiserror::Error;

const FRAGMENT_LIMIT: usize = 24;

/// Error raised for formula syntax outside the supported subset.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct ParseError {
    /// The error message.
    pub message: String,
    /// Source span where the error occurred.
    pub span: Span,
    /// Optional hint for fixing the error.
    pub hint: Option<String>,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ParseError {
    /// Create a new parse error.
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            hint: None,
        }
    }

    /// Add a hint to the error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// One-line description pointing at the offending fragment.
    ///
    /// Positions are 1-based character offsets into `source`.
    pub fn describe(&self, source: &str) -> String {
        let position = source
            .get(..self.span.start)
            .map_or(1, |prefix| prefix.chars().count() + 1);
        let mut result = format!("{} at position {}", self.message, position);

        let fragment = self.span.slice(source).trim();
        if !fragment.is_empty() {
            let shown: String = fragment.chars().take(FRAGMENT_LIMIT).collect();
            let ellipsis = if fragment.chars().count() > FRAGMENT_LIMIT { "..." } else { "" };
            result.push_str(&format!(" near `{}{}`", shown, ellipsis));
        }
        if let Some(hint) = &self.hint {
            result.push_str(&format!(" ({})", hint));
        }
        result
    }
}
