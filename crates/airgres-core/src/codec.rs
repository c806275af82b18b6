//! Conversion between stored rows and external records.
//!
//! Structured values (lists and objects) are stored as serialized JSON text
//! and materialized back on read. Text that looks like JSON but fails to parse
//! is passed through unchanged, and the literal texts `true` and `false`
//! materialize as booleans so boolean columns stored as text read naturally.

use serde_json::Value;

use crate::config::StorageLayout;
use crate::error::{Error, Result};
use crate::record::Record;
use crate::schema::TableSchema;
use crate::sql::{format_timestamp, Row, SqlValue};
use crate::value::{FieldValue, Fields};

/// A field prepared for writing: target column, its storage type, and the value.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredField {
    pub column: String,
    pub data_type: Option<String>,
    pub value: SqlValue,
}

/// Encodes and decodes records for one table.
pub struct RecordCodec<'a> {
    schema: &'a TableSchema,
    layout: &'a StorageLayout,
}

impl<'a> RecordCodec<'a> {
    pub fn new(schema: &'a TableSchema, layout: &'a StorageLayout) -> Self {
        Self { schema, layout }
    }

    /// Materialize a stored row into a record.
    pub fn to_external(&self, row: &Row) -> Result<Record> {
        let id = match row.get(&self.layout.record_id) {
            Some(SqlValue::Text(id)) => id.clone(),
            Some(SqlValue::Int(id)) => id.to_string(),
            _ => {
                return Err(Error::Upstream(format!(
                    "row in '{}' has no {} value",
                    self.schema.table(),
                    self.layout.record_id
                )))
            }
        };

        let created_time = match row.get(&self.layout.created_time) {
            Some(SqlValue::Timestamp(ts)) => Some(format_timestamp(ts)),
            Some(SqlValue::Text(text)) => Some(text.clone()),
            _ => None,
        };

        let fields = row
            .iter()
            .filter(|(column, _)| !self.layout.is_bookkeeping(column))
            .map(|(column, value)| (column.to_string(), materialize(value)))
            .collect();

        Ok(Record {
            id,
            created_time,
            fields,
        })
    }

    /// Serialize external fields into column writes.
    ///
    /// Fails with `SchemaNotFound` for a field with no backing column and with
    /// `Validation` for an attempt to write a bookkeeping column.
    pub fn to_storage(&self, fields: &Fields) -> Result<Vec<StoredField>> {
        fields
            .iter()
            .map(|(name, value)| {
                let column = self.schema.require_column(name)?;
                if self.layout.is_bookkeeping(&column.name) {
                    return Err(Error::Validation(format!(
                        "field '{}' is managed by the server",
                        name
                    )));
                }
                Ok(StoredField {
                    column: column.name.clone(),
                    data_type: column.data_type.clone(),
                    value: serialize(value),
                })
            })
            .collect()
    }
}

/// Decode one stored value.
pub fn materialize(value: &SqlValue) -> FieldValue {
    match value {
        SqlValue::Null => FieldValue::Null,
        SqlValue::Bool(b) => FieldValue::Bool(*b),
        SqlValue::Int(i) => FieldValue::from(*i),
        SqlValue::Float(f) => FieldValue::from(*f),
        SqlValue::Json(v) => FieldValue::from(v.clone()),
        SqlValue::Timestamp(ts) => FieldValue::Text(format_timestamp(ts)),
        SqlValue::Text(text) => materialize_text(text),
    }
}

fn materialize_text(text: &str) -> FieldValue {
    if text.starts_with('[') || text.starts_with('{') {
        if let Ok(parsed) = serde_json::from_str::<Value>(text) {
            return parsed.into();
        }
    }
    match text {
        "true" => FieldValue::Bool(true),
        "false" => FieldValue::Bool(false),
        _ => FieldValue::Text(text.to_string()),
    }
}

/// Encode one external value for storage.
pub fn serialize(value: &FieldValue) -> SqlValue {
    match value {
        FieldValue::Null => SqlValue::Null,
        FieldValue::Bool(b) => SqlValue::Bool(*b),
        FieldValue::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Int(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Float),
        },
        FieldValue::Text(s) => SqlValue::Text(s.clone()),
        FieldValue::List(items) => SqlValue::Text(Value::Array(items.clone()).to_string()),
        FieldValue::Object(map) => SqlValue::Text(Value::Object(map.clone()).to_string()),
    }
}
