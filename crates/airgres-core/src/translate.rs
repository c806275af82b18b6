//! Formula to SQL translation.
//!
//! Each recognized conjunct becomes one predicate over `CAST(column AS TEXT)`
//! so the same SQL works whatever the column's storage type. Predicates keep
//! their parameters unnumbered until they are written into a statement.

use airgres_formula::{Expr, Formula};
use tracing::warn;

use crate::config::{FilterMode, StorageLayout};
use crate::error::{Error, Result};
use crate::link::{LinkMap, LinkResolver, Resolution};
use crate::schema::TableSchema;
use crate::sql::{quote_ident, Dialect, SqlBuilder, SqlValue};
use crate::store::Database;

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Sql(String),
    Param(SqlValue),
}

/// One SQL predicate with positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterClause {
    pieces: Vec<Piece>,
}

impl FilterClause {
    fn new() -> Self {
        Self::default()
    }

    fn sql(mut self, sql: impl Into<String>) -> Self {
        self.pieces.push(Piece::Sql(sql.into()));
        self
    }

    fn param(mut self, value: impl Into<SqlValue>) -> Self {
        self.pieces.push(Piece::Param(value.into()));
        self
    }

    /// Parameters in the order their placeholders appear.
    pub fn params(&self) -> impl Iterator<Item = &SqlValue> {
        self.pieces.iter().filter_map(|piece| match piece {
            Piece::Param(value) => Some(value),
            Piece::Sql(_) => None,
        })
    }

    /// Append this predicate to a statement, numbering its placeholders.
    pub fn write_to(&self, builder: &mut SqlBuilder) {
        for piece in &self.pieces {
            match piece {
                Piece::Sql(sql) => {
                    builder.push(sql);
                }
                Piece::Param(value) => {
                    builder.push_param(value.clone());
                }
            }
        }
    }

    /// Render standalone, numbering placeholders from 1.
    pub fn render(&self, dialect: Dialect) -> String {
        let mut builder = SqlBuilder::new(dialect);
        self.write_to(&mut builder);
        builder.build().sql
    }
}

/// Translates `filterByFormula` into predicates over one table.
pub struct FormulaTranslator<'a> {
    db: &'a dyn Database,
    links: &'a LinkMap,
    layout: &'a StorageLayout,
    schema: &'a TableSchema,
    mode: FilterMode,
}

impl<'a> FormulaTranslator<'a> {
    pub fn new(
        db: &'a dyn Database,
        links: &'a LinkMap,
        layout: &'a StorageLayout,
        schema: &'a TableSchema,
        mode: FilterMode,
    ) -> Self {
        Self {
            db,
            links,
            layout,
            schema,
            mode,
        }
    }

    /// Translate a formula into conjunctive predicates.
    ///
    /// An empty or blank formula yields no predicates. Unrecognized fragments
    /// are dropped with a warning in lenient mode and rejected in strict mode.
    /// A field with no backing column fails with `SchemaNotFound`.
    pub async fn translate(&self, source: &str) -> Result<Vec<FilterClause>> {
        if source.trim().is_empty() {
            return Ok(Vec::new());
        }

        let formula = match self.mode {
            FilterMode::Strict => airgres_formula::parse_strict(source).map_err(|err| {
                Error::Validation(format!("invalid filterByFormula: {}", err.describe(source)))
            })?,
            FilterMode::Lenient => airgres_formula::parse(source),
        };
        self.translate_formula(source, &formula).await
    }

    async fn translate_formula(&self, source: &str, formula: &Formula) -> Result<Vec<FilterClause>> {
        let mut clauses = Vec::new();
        for expr in formula.conjuncts() {
            match expr {
                Expr::Search { needle, field, .. } => {
                    clauses.push(self.search(&field.value, &needle.value)?);
                }
                Expr::Equals { field, value, .. } => {
                    clauses.push(self.equals(&field.value, &value.value).await?);
                }
                Expr::IsTrue { field, .. } => {
                    clauses.push(self.is_true(&field.value)?);
                }
                Expr::Unrecognized { reason, span } => {
                    if self.mode == FilterMode::Strict {
                        return Err(Error::Validation(format!(
                            "unsupported filterByFormula syntax: {}",
                            reason
                        )));
                    }
                    warn!(
                        fragment = span.slice(source),
                        reason = %reason,
                        "dropping unsupported filterByFormula fragment"
                    );
                }
                Expr::And { .. } => {}
            }
        }
        Ok(clauses)
    }

    fn text_column(&self, field: &str) -> Result<String> {
        let column = self.schema.require_column(field)?;
        Ok(format!("CAST({} AS TEXT)", quote_ident(&column.name)))
    }

    fn position_fn(&self) -> &'static str {
        self.db.dialect().position_fn()
    }

    fn search(&self, field: &str, needle: &str) -> Result<FilterClause> {
        let column = self.text_column(field)?;
        Ok(FilterClause::new()
            .sql(format!("{}(LOWER({}), LOWER(", self.position_fn(), column))
            .param(needle)
            .sql(")) > 0"))
    }

    async fn equals(&self, field: &str, value: &str) -> Result<FilterClause> {
        let column = self.text_column(field)?;
        let resolver = LinkResolver::new(self.db, self.links, self.layout);
        let position = self.position_fn();

        match resolver.resolve(field, value, self.schema.table()).await {
            Resolution::Resolved(id) => Ok(FilterClause::new()
                .sql(format!("{}({}, ", position, column))
                .param(id)
                .sql(") > 0")),
            Resolution::NotALink | Resolution::NotFound => {
                // Plain columns match exactly; linked columns hold a JSON list
                // and match on the quoted token.
                let quoted = serde_json::Value::String(value.to_string()).to_string();
                Ok(FilterClause::new()
                    .sql(format!("({} = ", column))
                    .param(value)
                    .sql(format!(" OR {}({}, ", position, column))
                    .param(quoted)
                    .sql(") > 0)"))
            }
        }
    }

    fn is_true(&self, field: &str) -> Result<FilterClause> {
        let column = self.text_column(field)?;
        Ok(FilterClause::new().sql(format!("{} IN ('true', '1')", column)))
    }
}
