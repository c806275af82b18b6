//! Airtable-style filter formulas.
//!
//! This crate parses the subset of the Airtable formula language accepted as
//! `filterByFormula` into a small expression tree. It performs no I/O; the
//! `airgres-core` translator turns the tree into SQL predicates.
//!
//! # Supported forms
//!
//! ```text
//! {Status} = "active"
//! {Status} = 'active'
//! {Enabled} = TRUE()
//! SEARCH("needle", {Name})
//! SEARCH("needle", ARRAYJOIN({Tags}))
//! AND({Status} = "active", {Enabled} = TRUE())
//! ```
//!
//! Function names are case-insensitive. Anything else (`OR`, `NOT`, other
//! functions, other operators) parses into [`Expr::Unrecognized`].
//!
//! # Usage
//!
//! ```rust
//! use airgres_formula::{parse, parse_strict};
//!
//! let formula = parse(r#"AND({Status} = "active", OR({a} = "1", {b} = "2"))"#);
//! assert_eq!(formula.conjuncts().len(), 2);
//! assert_eq!(formula.unrecognized().len(), 1);
//!
//! assert!(parse_strict(r#"OR({a} = "1", {b} = "2")"#).is_err());
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;

pub use ast::{Expr, Formula};
pub use error::ParseError;
pub use parser::SUPPORTED_FORMS_HINT;
pub use span::{Span, Spanned};

/// Parse a formula, keeping unsupported fragments as [`Expr::Unrecognized`].
pub fn parse(source: &str) -> Formula {
    parser::parse(source)
}

/// Parse a formula, failing on the first unsupported fragment.
pub fn parse_strict(source: &str) -> Result<Formula, ParseError> {
    parser::parse_strict(source)
}

/// Tokenize a source string (for debugging/testing).
pub fn tokenize(source: &str) -> Vec<lexer::SpannedToken> {
    lexer::tokenize(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_world_formula() {
        let source = r#"AND(
            {Report ID} = "R-001",
            SEARCH("urgent", ARRAYJOIN({Tags})),
            {Published} = TRUE()
        )"#;
        let formula = parse(source);
        let fields: Vec<_> = formula.conjuncts().iter().filter_map(|e| e.field()).collect();
        assert_eq!(fields, vec!["Report ID", "Tags", "Published"]);
    }

    #[test]
    fn test_strict_error_with_source_context() {
        let source = r#"{Status} != "active""#;
        let err = parse_strict(source).unwrap_err();
        let described = err.describe(source);
        assert!(described.contains("position 1 near `{Status} != \"active\"`"), "{described}");
    }

    #[test]
    fn test_tokenize_exposes_tokens() {
        assert_eq!(tokenize("{a} = TRUE()").len(), 5);
    }
}
