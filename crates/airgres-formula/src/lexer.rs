//! Lexer for filter formulas using logos.
//!
//! Function names (`AND`, `SEARCH`, `ARRAYJOIN`, `TRUE`) are lexed as plain
//! identifiers; the parser matches them case-insensitively. Input the lexer
//! cannot classify is surfaced as [`Token::Symbol`] so the parser can mark the
//! surrounding term as unrecognized instead of silently dropping characters.

use crate::span::Span;
use logos::Logos;

/// Token types for the formula language.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token("=")]
    Eq,

    /// Field reference `{Field Name}`; the braces are stripped.
    #[regex(r"\{[^}]*\}", |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    FieldRef(String),

    /// String literal, double or single quoted, with escapes resolved.
    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len() - 1])
    })]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len() - 1])
    })]
    Str(String),

    /// Numeric literal, kept as written.
    #[regex(r"-?[0-9]+(\.[0-9]+)?", |lex| lex.slice().to_string())]
    Number(String),

    /// Function name or bare word.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    /// Operators and punctuation outside the supported subset.
    #[regex(r"[!<>&|+*/^%~?:;.#$@\[\]-]+", |lex| lex.slice().to_string())]
    Symbol(String),
}

impl Token {
    /// Whether this token is the identifier `name`, ignoring ASCII case.
    pub fn is_ident(&self, name: &str) -> bool {
        matches!(self, Token::Ident(ident) if ident.eq_ignore_ascii_case(name))
    }
}

/// Unescape a string literal, handling common escape sequences.
fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// A token with its span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Lexer that produces spanned tokens.
pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
}

impl<'source> Lexer<'source> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
        }
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Option<SpannedToken> {
        let token = match self.inner.next()? {
            Ok(token) => token,
            // Unterminated strings, stray braces and the like.
            Err(()) => Token::Symbol(self.inner.slice().to_string()),
        };
        Some(SpannedToken {
            token,
            span: self.inner.span().into(),
        })
    }
}

impl Iterator for Lexer<'_> {
    type Item = SpannedToken;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

/// Tokenize a source string into a vector of spanned tokens.
pub fn tokenize(source: &str) -> Vec<SpannedToken> {
    Lexer::new(source).collect()
}
