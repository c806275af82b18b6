//! SQL building blocks shared by the executors and the store adapters.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::Value;

/// Postgres `udt_name`s the adapter decodes without a text cast.
const NATIVE_PG_TYPES: &[&str] = &[
    "bool", "int2", "int4", "int8", "float4", "float8", "numeric", "json", "jsonb", "text",
    "varchar", "bpchar", "name", "uuid", "date", "time", "timestamp", "timestamptz",
    "_bool", "_int2", "_int4", "_int8", "_float4", "_float8", "_text", "_varchar", "_bpchar",
    "_uuid",
];

/// SQL dialect of a backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Positional placeholder for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            Dialect::Sqlite => format!("?{}", index),
        }
    }

    /// Substring position function: `f(haystack, needle) > 0` tests containment.
    pub fn position_fn(&self) -> &'static str {
        match self {
            Dialect::Postgres => "strpos",
            Dialect::Sqlite => "instr",
        }
    }

    /// Whether a column of storage type `data_type` has to be read through a
    /// text cast. Postgres columns outside the natively decoded set (intervals,
    /// network addresses, geometric and user-defined types) are.
    pub fn reads_as_text(&self, data_type: Option<&str>) -> bool {
        match (self, data_type) {
            (Dialect::Postgres, Some(ty)) => {
                !NATIVE_PG_TYPES.contains(&ty.trim().to_ascii_lowercase().as_str())
            }
            _ => false,
        }
    }

    /// Cast target for a value written to a column of storage type `data_type`.
    ///
    /// Postgres does not coerce untyped text parameters into typed columns, so
    /// written values are sent as text and cast explicitly. SQLite needs no cast.
    pub fn write_cast(&self, data_type: Option<&str>) -> Option<String> {
        match self {
            Dialect::Sqlite => None,
            Dialect::Postgres => {
                let ty = data_type?.trim();
                if ty.is_empty()
                    || !ty
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ')
                {
                    return None;
                }
                match ty.strip_prefix('_') {
                    Some(element) => Some(format!("{}[]", element)),
                    None => Some(ty.to_string()),
                }
            }
        }
    }
}

/// Rewrite a JSON list written to a Postgres array column as an array
/// literal (`{"a","b"}`). Anything that is not a JSON list goes through as text.
fn array_literal(value: SqlValue) -> SqlValue {
    let parsed = match &value {
        SqlValue::Json(v) => Some(v.clone()),
        SqlValue::Text(s) if s.trim_start().starts_with('[') => serde_json::from_str(s).ok(),
        _ => None,
    };
    match parsed {
        Some(list @ Value::Array(_)) => SqlValue::Text(render_array_element(&list)),
        _ => value.into_text(),
    }
}

fn render_array_element(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_array_text(s),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(render_array_element).collect();
            format!("{{{}}}", inner.join(","))
        }
        Value::Object(_) => quote_array_text(&value.to_string()),
    }
}

fn quote_array_text(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render a timestamp the way records expose it: RFC 3339, millisecond precision, `Z`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A value crossing the storage boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Native JSON column value (Postgres `json`/`jsonb`).
    Json(Value),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Borrow the text payload, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Text rendering used when a backend needs every parameter as text.
    pub fn into_text(self) -> SqlValue {
        match self {
            SqlValue::Null => SqlValue::Null,
            SqlValue::Bool(b) => SqlValue::Text(b.to_string()),
            SqlValue::Int(i) => SqlValue::Text(i.to_string()),
            SqlValue::Float(f) => SqlValue::Text(f.to_string()),
            SqlValue::Text(s) => SqlValue::Text(s),
            SqlValue::Json(v) => SqlValue::Text(v.to_string()),
            SqlValue::Timestamp(ts) => SqlValue::Text(format_timestamp(&ts)),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

/// A complete SQL statement with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Incremental statement builder that numbers placeholders as they are pushed.
#[derive(Debug, Clone)]
pub struct SqlBuilder {
    dialect: Dialect,
    sql: String,
    params: Vec<SqlValue>,
}

impl SqlBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Append raw SQL.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Append a quoted identifier.
    pub fn push_ident(&mut self, name: &str) -> &mut Self {
        self.sql.push_str(&quote_ident(name));
        self
    }

    /// Append a placeholder bound to `value`.
    pub fn push_param(&mut self, value: SqlValue) -> &mut Self {
        self.params.push(value);
        let placeholder = self.dialect.placeholder(self.params.len());
        self.sql.push_str(&placeholder);
        self
    }

    /// Append a placeholder for a value written into a column of `data_type`.
    pub fn push_write_param(&mut self, value: SqlValue, data_type: Option<&str>) -> &mut Self {
        match self.dialect.write_cast(data_type) {
            Some(cast) => {
                let value = if cast.ends_with("[]") {
                    array_literal(value)
                } else {
                    value.into_text()
                };
                self.params.push(value);
                let placeholder = self.dialect.placeholder(self.params.len());
                self.sql
                    .push_str(&format!("CAST({} AS {})", placeholder, cast));
            }
            None => {
                self.push_param(value);
            }
        }
        self
    }

    /// Append the select list for `columns`, reading columns the store cannot
    /// decode natively through a text cast under their own name.
    pub fn push_columns<'c>(
        &mut self,
        columns: impl IntoIterator<Item = (&'c str, Option<&'c str>)>,
    ) -> &mut Self {
        let dialect = self.dialect;
        self.push_separated(columns, ", ", |sql, (name, data_type)| {
            if dialect.reads_as_text(data_type) {
                sql.push("CAST(")
                    .push_ident(name)
                    .push(" AS TEXT) AS ")
                    .push_ident(name);
            } else {
                sql.push_ident(name);
            }
        })
    }

    /// Append `items` separated by `separator`, rendering each with `f`.
    pub fn push_separated<T>(
        &mut self,
        items: impl IntoIterator<Item = T>,
        separator: &str,
        mut f: impl FnMut(&mut Self, T),
    ) -> &mut Self {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(separator);
            }
            f(self, item);
        }
        self
    }

    pub fn build(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// A result row keyed by column name, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: IndexMap<String, SqlValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: IndexMap::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, column: impl Into<String>, value: SqlValue) {
        self.columns.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, SqlValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}
