//! Recursive descent parser for filter formulas.
//!
//! The parser never fails outright. A fragment outside the supported subset
//! becomes an [`Expr::Unrecognized`] node and parsing resumes at the next
//! argument boundary, so one bad argument of `AND(...)` leaves its siblings
//! intact. Callers decide what an unrecognized fragment means.

use crate::ast::{Expr, Formula};
use crate::error::ParseError;
use crate::lexer::{tokenize, SpannedToken, Token};
use crate::span::{Span, Spanned};

/// Hint attached to errors about unsupported syntax.
pub const SUPPORTED_FORMS_HINT: &str = "supported forms are AND(...), {field} = \"value\", \
     {field} = TRUE(), SEARCH(\"text\", {field}) and SEARCH(\"text\", ARRAYJOIN({field}))";

/// Where an expression is allowed to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    /// End of input.
    End,
    /// A `,` or `)` closing an argument of `AND(...)`.
    Argument,
}

/// Parser for the formula language.
pub struct Parser<'source> {
    tokens: Vec<SpannedToken>,
    pos: usize,
    source: &'source str,
}

impl<'source> Parser<'source> {
    /// Create a new parser for the given source.
    pub fn new(source: &'source str) -> Self {
        Self {
            tokens: tokenize(source),
            pos: 0,
            source,
        }
    }

    /// Parse the whole source into a formula.
    pub fn parse_formula(&mut self) -> Formula {
        let span = Span::new(0, self.source.len());
        if self.tokens.is_empty() {
            return Formula { root: None, span };
        }

        let root = self.parse_bounded(Boundary::End);
        Formula {
            root: Some(root),
            span,
        }
    }

    /// Parse one expression that has to end exactly at `boundary`.
    fn parse_bounded(&mut self, boundary: Boundary) -> Expr {
        let start = self.pos;
        match self.parse_expr() {
            Ok(expr) if self.at_boundary(boundary) => expr,
            Ok(_) => {
                let span = self.peek_span();
                let err = ParseError::new("unexpected input after condition", span);
                self.recover(start, boundary, err)
            }
            Err(err) => self.recover(start, boundary, err),
        }
    }

    /// Rewind to `start` and skip the whole fragment up to `boundary`.
    fn recover(&mut self, start: usize, boundary: Boundary, err: ParseError) -> Expr {
        self.pos = start;
        let mut depth = 0usize;

        while let Some(tok) = self.tokens.get(self.pos) {
            match tok.token {
                Token::LParen => depth += 1,
                Token::RParen if depth == 0 && boundary == Boundary::Argument => break,
                Token::RParen => depth = depth.saturating_sub(1),
                Token::Comma if depth == 0 && boundary == Boundary::Argument => break,
                _ => {}
            }
            self.pos += 1;
        }

        let span = if self.pos > start {
            self.tokens[start].span.merge(self.tokens[self.pos - 1].span)
        } else {
            let at = self.peek_span().start;
            Span::new(at, at)
        };

        Expr::Unrecognized {
            reason: err.message,
            span,
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let tok = self
            .peek()
            .cloned()
            .ok_or_else(|| ParseError::new("expected a condition", self.eof_span()))?;

        match &tok.token {
            t if t.is_ident("AND") => self.parse_and(),
            t if t.is_ident("SEARCH") => self.parse_search(),
            Token::FieldRef(_) => self.parse_comparison(),
            Token::Ident(name) => Err(ParseError::new(
                format!("unsupported function '{}'", name),
                tok.span,
            )
            .with_hint(SUPPORTED_FORMS_HINT)),
            other => Err(ParseError::new(
                format!("expected a condition, found {:?}", other),
                tok.span,
            )),
        }
    }

    /// Parse `AND(expr, ...)`.
    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let start = self.bump()?.span;
        self.expect(Token::LParen)?;

        let mut args = Vec::new();
        if let Some(close) = self.eat(&Token::RParen) {
            return Ok(Expr::And {
                args,
                span: start.merge(close.span),
            });
        }

        loop {
            args.push(self.parse_bounded(Boundary::Argument));

            if self.eat(&Token::Comma).is_some() {
                continue;
            }
            if let Some(close) = self.eat(&Token::RParen) {
                return Ok(Expr::And {
                    args,
                    span: start.merge(close.span),
                });
            }
            return Err(ParseError::new("unclosed AND(...)", start));
        }
    }

    /// Parse `SEARCH("needle", {field})` or `SEARCH("needle", ARRAYJOIN({field}))`.
    fn parse_search(&mut self) -> Result<Expr, ParseError> {
        let start = self.bump()?.span;
        self.expect(Token::LParen)?;
        let needle = self.expect_string()?;
        self.expect(Token::Comma)?;

        let (field, array_join) = match self.peek() {
            Some(tok) if tok.token.is_ident("ARRAYJOIN") => {
                self.bump()?;
                self.expect(Token::LParen)?;
                let field = self.expect_field()?;
                self.expect(Token::RParen)?;
                (field, true)
            }
            _ => (self.expect_field()?, false),
        };

        let close = self.expect(Token::RParen)?;
        Ok(Expr::Search {
            needle,
            field,
            array_join,
            span: start.merge(close.span),
        })
    }

    /// Parse `{field} = "value"` or `{field} = TRUE()`.
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let field = self.expect_field()?;

        let op = self.bump()?;
        if op.token != Token::Eq {
            return Err(ParseError::new(
                format!("expected '=' after field reference, found {:?}", op.token),
                op.span,
            )
            .with_hint("only equality comparisons are supported"));
        }

        let value = self.bump()?;
        match value.token {
            Token::Str(text) => Ok(Expr::Equals {
                span: field.span.merge(value.span),
                field,
                value: Spanned::new(text, value.span),
            }),
            ref t if t.is_ident("TRUE") => {
                self.expect(Token::LParen)?;
                let close = self.expect(Token::RParen)?;
                Ok(Expr::IsTrue {
                    span: field.span.merge(close.span),
                    field,
                })
            }
            other => Err(ParseError::new(
                format!("expected a quoted string or TRUE(), found {:?}", other),
                value.span,
            )),
        }
    }

    fn expect_field(&mut self) -> Result<Spanned<String>, ParseError> {
        let tok = self.bump()?;
        match tok.token {
            Token::FieldRef(name) => Ok(Spanned::new(name, tok.span)),
            other => Err(ParseError::new(
                format!("expected a {{field}} reference, found {:?}", other),
                tok.span,
            )),
        }
    }

    fn expect_string(&mut self) -> Result<Spanned<String>, ParseError> {
        let tok = self.bump()?;
        match tok.token {
            Token::Str(text) => Ok(Spanned::new(text, tok.span)),
            other => Err(ParseError::new(
                format!("expected a quoted string, found {:?}", other),
                tok.span,
            )),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<SpannedToken, ParseError> {
        let tok = self.bump()?;
        if tok.token == expected {
            Ok(tok)
        } else {
            Err(ParseError::new(
                format!("expected {:?}, found {:?}", expected, tok.token),
                tok.span,
            ))
        }
    }

    /// Consume the next token if it equals `expected`.
    fn eat(&mut self, expected: &Token) -> Option<SpannedToken> {
        match self.tokens.get(self.pos) {
            Some(tok) if &tok.token == expected => {
                self.pos += 1;
                Some(tok.clone())
            }
            _ => None,
        }
    }

    fn bump(&mut self) -> Result<SpannedToken, ParseError> {
        match self.tokens.get(self.pos) {
            Some(tok) => {
                self.pos += 1;
                Ok(tok.clone())
            }
            None => Err(ParseError::new("unexpected end of formula", self.eof_span())),
        }
    }

    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn peek_span(&self) -> Span {
        self.peek().map(|t| t.span).unwrap_or_else(|| self.eof_span())
    }

    fn eof_span(&self) -> Span {
        Span::new(self.source.len(), self.source.len())
    }

    fn at_boundary(&self, boundary: Boundary) -> bool {
        match (boundary, self.peek()) {
            (_, None) => true,
            (Boundary::End, Some(_)) => false,
            (Boundary::Argument, Some(tok)) => {
                matches!(tok.token, Token::Comma | Token::RParen)
            }
        }
    }
}

/// Parse a formula, keeping unsupported fragments as [`Expr::Unrecognized`].
pub fn parse(source: &str) -> Formula {
    Parser::new(source).parse_formula()
}

/// Parse a formula, failing on the first unsupported fragment.
pub fn parse_strict(source: &str) -> Result<Formula, ParseError> {
    let formula = parse(source);
    if let Some(Expr::Unrecognized { reason, span }) = formula.unrecognized().first() {
        return Err(ParseError::new(reason.clone(), *span).with_hint(SUPPORTED_FORMS_HINT));
    }
    Ok(formula)
}
