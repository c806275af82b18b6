//! Listing and single-record reads.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codec::RecordCodec;
use crate::config::{ServiceConfig, StorageLayout};
use crate::error::{Error, Result};
use crate::link::LinkMap;
use crate::record::Record;
use crate::schema::{self, normalize_identifier, TableSchema};
use crate::sql::{Dialect, SqlBuilder, SqlValue, Statement};
use crate::store::Database;
use crate::translate::{FilterClause, FormulaTranslator};

const CURSOR_PREFIX: &str = "itr";

/// Opaque pagination cursor wrapping a row offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PaginationCursor(u64);

impl PaginationCursor {
    pub fn new(offset: u64) -> Self {
        Self(offset)
    }

    pub fn offset(&self) -> u64 {
        self.0
    }

    /// `itr` followed by the offset as 16 hex digits.
    pub fn encode(&self) -> String {
        format!("{}{}", CURSOR_PREFIX, hex::encode(self.0.to_be_bytes()))
    }

    /// Decode a cursor; a bare decimal offset is accepted too.
    ///
    /// Offsets beyond what SQL `OFFSET` accepts (`i64::MAX`) are rejected.
    pub fn decode(token: &str) -> Result<Self> {
        let invalid = || Error::Validation(format!("invalid offset '{}'", token));
        let token = token.trim();

        let offset = match token.strip_prefix(CURSOR_PREFIX) {
            Some(digits) => {
                let bytes = hex::decode(digits).map_err(|_| invalid())?;
                let bytes: [u8; 8] = bytes.try_into().map_err(|_| invalid())?;
                u64::from_be_bytes(bytes)
            }
            None => token.parse::<u64>().map_err(|_| invalid())?,
        };
        if offset > i64::MAX as u64 {
            return Err(invalid());
        }
        Ok(Self(offset))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(Error::Validation(format!(
                "invalid sort direction '{}', expected 'asc' or 'desc'",
                other
            ))),
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Options for a list request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    pub filter_by_formula: Option<String>,
    pub sort: Vec<SortSpec>,
    pub max_records: Option<usize>,
    pub page_size: Option<usize>,
    pub offset: Option<String>,
    pub fields: Vec<String>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, formula: impl Into<String>) -> Self {
        self.filter_by_formula = Some(formula.into());
        self
    }

    pub fn sort(mut self, spec: SortSpec) -> Self {
        self.sort.push(spec);
        self
    }

    pub fn max_records(mut self, n: usize) -> Self {
        self.max_records = Some(n);
        self
    }

    pub fn page_size(mut self, n: usize) -> Self {
        self.page_size = Some(n);
        self
    }

    pub fn offset(mut self, cursor: impl Into<String>) -> Self {
        self.offset = Some(cursor.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    /// The smaller of `maxRecords` and `pageSize`, whichever are given.
    fn requested_page_size(&self) -> Option<usize> {
        match (self.max_records, self.page_size) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub records: Vec<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
}

impl Page {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_more(&self) -> bool {
        self.offset.is_some()
    }
}

/// Executes reads against one store.
pub struct QueryExecutor<'a> {
    db: &'a dyn Database,
    links: &'a LinkMap,
    config: &'a ServiceConfig,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(db: &'a dyn Database, links: &'a LinkMap, config: &'a ServiceConfig) -> Self {
        Self { db, links, config }
    }

    /// List one page of records.
    ///
    /// A missing table or an unknown filter field yields an empty page: no
    /// row can satisfy a predicate on a column that does not exist. An unknown
    /// sort field is skipped with a warning instead, since ordering never
    /// changes which rows match; the remaining keys and the tiebreak still
    /// give a stable order.
    pub async fn list(&self, table: &str, options: &ListOptions) -> Result<Page> {
        let table = normalize_identifier(table);
        let start = match &options.offset {
            Some(token) => PaginationCursor::decode(token)?.offset(),
            None => 0,
        };
        let page_size = self.config.page_size(options.requested_page_size());

        let schema = match schema::introspect(self.db, &table).await {
            Ok(schema) => schema,
            Err(Error::SchemaNotFound(reason)) => {
                debug!(table = %table, reason = %reason, "listing missing table");
                return Ok(Page::empty());
            }
            Err(e) => return Err(e),
        };

        let clauses = match options.filter_by_formula.as_deref() {
            Some(formula) => {
                let translator = FormulaTranslator::new(
                    self.db,
                    self.links,
                    &self.config.layout,
                    &schema,
                    self.config.filter_mode,
                );
                match translator.translate(formula).await {
                    Ok(clauses) => clauses,
                    Err(Error::SchemaNotFound(reason)) => {
                        debug!(table = %table, reason = %reason, "filter references unknown field");
                        return Ok(Page::empty());
                    }
                    Err(e) => return Err(e),
                }
            }
            None => Vec::new(),
        };

        let statement = select_page(
            self.db.dialect(),
            &schema,
            &self.config.layout,
            &clauses,
            &options.sort,
            page_size,
            start,
        );
        let mut rows = self.db.fetch_all(&statement).await?;

        let has_more = rows.len() > page_size;
        rows.truncate(page_size);

        let codec = RecordCodec::new(&schema, &self.config.layout);
        let mut records = rows
            .iter()
            .map(|row| codec.to_external(row))
            .collect::<Result<Vec<_>>>()?;
        if !options.fields.is_empty() {
            for record in &mut records {
                record.fields.project(&options.fields);
            }
        }

        let offset = has_more.then(|| PaginationCursor::new(start.saturating_add(page_size as u64)).encode());
        debug!(table = %table, count = records.len(), has_more, "listed records");
        Ok(Page { records, offset })
    }

    /// Fetch one record by id.
    pub async fn find(&self, table: &str, id: &str) -> Result<Record> {
        let table = normalize_identifier(table);
        let schema = schema::introspect(self.db, &table)
            .await
            .map_err(Error::on_read)?;
        fetch_record(self.db, &schema, &self.config.layout, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("record {} not found in {}", id, table)))
    }
}

fn select_page(
    dialect: Dialect,
    schema: &TableSchema,
    layout: &StorageLayout,
    clauses: &[FilterClause],
    sort: &[SortSpec],
    page_size: usize,
    start: u64,
) -> Statement {
    let mut sql = SqlBuilder::new(dialect);
    sql.push("SELECT ")
        .push_columns(select_list(schema))
        .push(" FROM ")
        .push_ident(schema.table());

    if !clauses.is_empty() {
        sql.push(" WHERE ")
            .push_separated(clauses, " AND ", |sql, clause| clause.write_to(sql));
    }

    let mut order: Vec<(String, &'static str, bool)> = Vec::new();
    for spec in sort {
        match schema.column_for(&spec.field) {
            Some(column) => order.push((column.name.clone(), spec.direction.as_sql(), true)),
            None => warn!(field = %spec.field, table = schema.table(), "skipping sort on unknown field"),
        }
    }
    let tiebreak = [&layout.primary_key, &layout.record_id]
        .into_iter()
        .find(|column| schema.has_column(column));
    if let Some(column) = tiebreak {
        order.push((column.clone(), "ASC", false));
    }

    if !order.is_empty() {
        sql.push(" ORDER BY ")
            .push_separated(order, ", ", |sql, (column, direction, nulls_last)| {
                // Qualified so a text-cast output column of the same name is not picked.
                sql.push_ident(schema.table())
                    .push(".")
                    .push_ident(&column)
                    .push(" ")
                    .push(direction);
                if nulls_last {
                    sql.push(" NULLS LAST");
                }
            });
    }

    sql.push(&format!(" LIMIT {}", page_size + 1));
    if start > 0 {
        sql.push(&format!(" OFFSET {}", start));
    }
    sql.build()
}

fn select_list(schema: &TableSchema) -> impl Iterator<Item = (&str, Option<&str>)> {
    schema
        .columns()
        .iter()
        .map(|column| (column.name.as_str(), column.data_type.as_deref()))
}

/// Fetch one record by id from an already-introspected table.
pub(crate) async fn fetch_record(
    db: &dyn Database,
    schema: &TableSchema,
    layout: &StorageLayout,
    id: &str,
) -> Result<Option<Record>> {
    let mut sql = SqlBuilder::new(db.dialect());
    sql.push("SELECT ")
        .push_columns(select_list(schema))
        .push(" FROM ")
        .push_ident(schema.table())
        .push(" WHERE ")
        .push_ident(&layout.record_id)
        .push(" = ")
        .push_param(SqlValue::Text(id.to_string()))
        .push(" LIMIT 1");

    let rows = db.fetch_all(&sql.build()).await?;
    rows.first()
        .map(|row| RecordCodec::new(schema, layout).to_external(row))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_encoding() {
        let cursor = PaginationCursor::new(1000);
        assert_eq!(cursor.encode(), "itr00000000000003e8");
        assert_eq!(PaginationCursor::decode("itr00000000000003e8").unwrap(), cursor);
        assert_eq!(PaginationCursor::decode("1000").unwrap(), cursor);

        let last = PaginationCursor::decode("itr7fffffffffffffff").unwrap();
        assert_eq!(last.offset(), i64::MAX as u64);
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        for token in [
            "itrzz",
            "itr00",
            "abc",
            "-1",
            "",
            "itrffffffffffffffff",
            "itr8000000000000000",
            "18446744073709551615",
        ] {
            let err = PaginationCursor::decode(token).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{token}");
        }
    }

    #[test]
    fn test_sort_direction_parsing() {
        assert_eq!("DESC".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert!(matches!(
            "sideways".parse::<SortDirection>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_requested_page_size() {
        assert_eq!(ListOptions::new().requested_page_size(), None);
        assert_eq!(ListOptions::new().max_records(5).requested_page_size(), Some(5));
        assert_eq!(
            ListOptions::new().max_records(50).page_size(10).requested_page_size(),
            Some(10)
        );
    }

    #[test]
    fn test_select_page_reads_opaque_columns_as_text() {
        use crate::store::ColumnInfo;

        let schema = TableSchema::new(
            "events",
            vec![
                ColumnInfo::new("id", Some("int8".into())),
                ColumnInfo::new("record_id", Some("text".into())),
                ColumnInfo::new("owner", Some("uuid".into())),
                ColumnInfo::new("duration", Some("interval".into())),
            ],
        );
        let statement = select_page(
            Dialect::Postgres,
            &schema,
            &StorageLayout::default(),
            &[],
            &[SortSpec::desc("duration")],
            10,
            20,
        );
        assert_eq!(
            statement.sql,
            r#"SELECT "id", "record_id", "owner", CAST("duration" AS TEXT) AS "duration" FROM "events" ORDER BY "events"."duration" DESC NULLS LAST, "events"."id" ASC LIMIT 11 OFFSET 20"#
        );
    }

    #[test]
    fn test_page_serialization_omits_missing_offset() {
        let page = Page::empty();
        assert_eq!(serde_json::to_string(&page).unwrap(), r#"{"records":[]}"#);
    }
}
