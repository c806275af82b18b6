//! Abstract syntax tree for filter formulas.

use crate::span::{Span, Spanned};

/// A parsed filter formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    /// Root expression, `None` for an empty formula.
    pub root: Option<Expr>,
    /// Span of the whole source.
    pub span: Span,
}

impl Formula {
    /// The empty formula (no predicate).
    pub fn empty() -> Self {
        Self {
            root: None,
            span: Span::default(),
        }
    }

    /// Flatten the formula into its conjuncts.
    ///
    /// Nested `AND` calls are flattened; every returned expression is a leaf
    /// (a recognized term or an [`Expr::Unrecognized`] fragment).
    pub fn conjuncts(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            collect_conjuncts(root, &mut out);
        }
        out
    }

    /// Fragments the parser could not recognize, in source order.
    pub fn unrecognized(&self) -> Vec<&Expr> {
        self.conjuncts()
            .into_iter()
            .filter(|expr| matches!(expr, Expr::Unrecognized { .. }))
            .collect()
    }

    /// Whether every fragment of the formula was recognized.
    pub fn is_fully_recognized(&self) -> bool {
        self.unrecognized().is_empty()
    }
}

fn collect_conjuncts<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::And { args, .. } => {
            for arg in args {
                collect_conjuncts(arg, out);
            }
        }
        other => out.push(other),
    }
}

/// A formula expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `AND(expr, ...)`.
    And { args: Vec<Expr>, span: Span },
    /// `SEARCH("needle", {field})` or `SEARCH("needle", ARRAYJOIN({field}))`.
    Search {
        needle: Spanned<String>,
        field: Spanned<String>,
        array_join: bool,
        span: Span,
    },
    /// `{field} = "value"`.
    Equals {
        field: Spanned<String>,
        value: Spanned<String>,
        span: Span,
    },
    /// `{field} = TRUE()`.
    IsTrue { field: Spanned<String>, span: Span },
    /// Syntax outside the supported subset.
    Unrecognized { reason: String, span: Span },
}

impl Expr {
    /// Get the span of this expression.
    pub fn span(&self) -> Span {
        match self {
            Expr::And { span, .. }
            | Expr::Search { span, .. }
            | Expr::Equals { span, .. }
            | Expr::IsTrue { span, .. }
            | Expr::Unrecognized { span, .. } => *span,
        }
    }

    /// The field this term tests, if it is a recognized leaf term.
    pub fn field(&self) -> Option<&str> {
        match self {
            Expr::Search { field, .. } | Expr::Equals { field, .. } | Expr::IsTrue { field, .. } => {
                Some(&field.value)
            }
            Expr::And { .. } | Expr::Unrecognized { .. } => None,
        }
    }
}
