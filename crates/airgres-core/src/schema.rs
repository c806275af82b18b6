//! Table and column discovery.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::store::{ColumnInfo, Database};

/// Normalize a table or field name for storage lookup: Unicode lowercase,
/// then every character outside `[a-z0-9_]` replaced by `_`.
///
/// Lowercasing runs first, so a character with a multi-character lowercase
/// form (`İ` → `i̇`) contributes one output character per lowered character.
pub fn normalize_identifier(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Columns of one table, with field-to-column lookup.
#[derive(Debug, Clone)]
pub struct TableSchema {
    table: String,
    columns: Vec<ColumnInfo>,
    by_name: HashMap<String, usize>,
    by_normalized: HashMap<String, usize>,
}

impl TableSchema {
    pub fn new(table: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        let mut by_name = HashMap::with_capacity(columns.len());
        let mut by_normalized = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            by_name.insert(column.name.clone(), i);
            by_normalized
                .entry(normalize_identifier(&column.name))
                .or_insert(i);
        }
        Self {
            table: table.into(),
            columns,
            by_name,
            by_normalized,
        }
    }

    /// Storage name of the table.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.by_name.get(name).map(|&i| &self.columns[i])
    }

    /// Column backing an external field name: exact match first, then the
    /// normalized name.
    pub fn column_for(&self, field: &str) -> Option<&ColumnInfo> {
        self.by_name
            .get(field)
            .or_else(|| self.by_normalized.get(&normalize_identifier(field)))
            .map(|&i| &self.columns[i])
    }

    /// Like [`TableSchema::column_for`], failing with `SchemaNotFound`.
    pub fn require_column(&self, field: &str) -> Result<&ColumnInfo> {
        self.column_for(field).ok_or_else(|| {
            Error::SchemaNotFound(format!(
                "unknown field '{}' on table '{}'",
                field, self.table
            ))
        })
    }
}

/// Look up the columns of `table`; a table with no columns does not exist.
pub async fn introspect(db: &dyn Database, table: &str) -> Result<TableSchema> {
    let columns = db.describe_table(table).await?;
    if columns.is_empty() {
        return Err(Error::SchemaNotFound(format!("unknown table '{}'", table)));
    }
    Ok(TableSchema::new(table, columns))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TableSchema {
        TableSchema::new(
            "reports",
            vec![
                ColumnInfo::new("id", Some("INTEGER".into())),
                ColumnInfo::new("report_id", Some("TEXT".into())),
                ColumnInfo::new("Title", Some("TEXT".into())),
            ],
        )
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("Report ID"), "report_id");
        assert_eq!(normalize_identifier("reports"), "reports");
        assert_eq!(normalize_identifier("Sales-2024 (EU)"), "sales_2024__eu_");
        assert_eq!(normalize_identifier("Café"), "caf_");
        assert_eq!(normalize_identifier("İd"), "i_d");
        assert_eq!(normalize_identifier("ÀB"), "_b");
    }

    #[test]
    fn test_column_for_exact_then_normalized() {
        let schema = schema();
        assert_eq!(schema.column_for("Title").unwrap().name, "Title");
        assert_eq!(schema.column_for("Report ID").unwrap().name, "report_id");
        assert!(schema.column_for("Missing").is_none());
    }

    #[test]
    fn test_require_column_reports_schema_miss() {
        let err = schema().require_column("Nope").unwrap_err();
        assert!(matches!(err, Error::SchemaNotFound(_)));
    }
}
