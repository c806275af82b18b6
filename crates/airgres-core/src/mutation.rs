//! Record creation, update, and deletion.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info};

use crate::codec::{RecordCodec, StoredField};
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::query::fetch_record;
use crate::record::{generate_record_id, DeletedRecord, Record};
use crate::schema::{self, normalize_identifier, TableSchema};
use crate::sql::{SqlBuilder, SqlValue};
use crate::store::Database;
use crate::value::Fields;

/// Executes writes against one store.
pub struct MutationExecutor<'a> {
    db: &'a dyn Database,
    config: &'a ServiceConfig,
}

impl<'a> MutationExecutor<'a> {
    pub fn new(db: &'a dyn Database, config: &'a ServiceConfig) -> Self {
        Self { db, config }
    }

    /// Create a record and return it as stored.
    pub async fn create(&self, table: &str, fields: &Fields) -> Result<Record> {
        let schema = self.schema(table).await?;
        self.create_in(&schema, fields).await
    }

    /// Create several records in order, stopping at the first failure.
    pub async fn create_many(&self, table: &str, batch: &[Fields]) -> Result<Vec<Record>> {
        let schema = self.schema(table).await?;
        let mut records = Vec::with_capacity(batch.len());
        for fields in batch {
            records.push(self.create_in(&schema, fields).await?);
        }
        Ok(records)
    }

    /// Apply a partial update and return the updated record.
    pub async fn update(&self, table: &str, id: &str, fields: &Fields) -> Result<Record> {
        check_update(id, fields)?;
        let schema = self.schema(table).await?;
        self.update_in(&schema, id, fields).await
    }

    /// Update several records in order, stopping at the first failure.
    pub async fn update_many(&self, table: &str, batch: &[(String, Fields)]) -> Result<Vec<Record>> {
        for (id, fields) in batch {
            check_update(id, fields)?;
        }
        let schema = self.schema(table).await?;
        let mut records = Vec::with_capacity(batch.len());
        for (id, fields) in batch {
            records.push(self.update_in(&schema, id, fields).await?);
        }
        Ok(records)
    }

    /// Delete records by id; ids that do not exist are omitted from the result.
    pub async fn destroy(&self, table: &str, ids: &[String]) -> Result<Vec<DeletedRecord>> {
        if ids.is_empty() {
            return Err(Error::Validation("at least one record id is required".into()));
        }
        let schema = self.schema(table).await?;
        let layout = &self.config.layout;

        let mut sql = SqlBuilder::new(self.db.dialect());
        sql.push("DELETE FROM ")
            .push_ident(schema.table())
            .push(" WHERE ")
            .push_ident(&layout.record_id)
            .push(" IN (")
            .push_separated(ids, ", ", |sql, id| {
                sql.push_param(SqlValue::Text(id.clone()));
            })
            .push(") RETURNING ")
            .push_ident(&layout.record_id);

        let rows = self.db.fetch_all(&sql.build()).await?;
        let deleted: HashSet<String> = rows
            .iter()
            .filter_map(|row| row.get(&layout.record_id))
            .filter_map(|id| id.as_text().map(str::to_string))
            .collect();

        info!(table = schema.table(), requested = ids.len(), deleted = deleted.len(), "deleted records");

        // Acknowledge in request order, once per id.
        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| deleted.contains(*id) && seen.insert(id.as_str()))
            .map(DeletedRecord::new)
            .collect())
    }

    async fn schema(&self, table: &str) -> Result<TableSchema> {
        schema::introspect(self.db, &normalize_identifier(table))
            .await
            .map_err(Error::on_write)
    }

    fn stored_fields(&self, schema: &TableSchema, fields: &Fields) -> Result<Vec<StoredField>> {
        RecordCodec::new(schema, &self.config.layout)
            .to_storage(fields)
            .map_err(Error::on_write)
    }

    async fn create_in(&self, schema: &TableSchema, fields: &Fields) -> Result<Record> {
        let layout = &self.config.layout;
        if !schema.has_column(&layout.record_id) {
            return Err(Error::Upstream(format!(
                "table '{}' has no {} column",
                schema.table(),
                layout.record_id
            )));
        }

        let mut columns = self.stored_fields(schema, fields)?;
        let id = generate_record_id();
        columns.insert(
            0,
            StoredField {
                column: layout.record_id.clone(),
                data_type: schema.column(&layout.record_id).and_then(|c| c.data_type.clone()),
                value: SqlValue::Text(id.clone()),
            },
        );
        if let Some(created) = schema.column(&layout.created_time) {
            columns.insert(
                1,
                StoredField {
                    column: created.name.clone(),
                    data_type: created.data_type.clone(),
                    value: SqlValue::Timestamp(Utc::now()),
                },
            );
        }

        let mut sql = SqlBuilder::new(self.db.dialect());
        sql.push("INSERT INTO ")
            .push_ident(schema.table())
            .push(" (")
            .push_separated(&columns, ", ", |sql, field| {
                sql.push_ident(&field.column);
            })
            .push(") VALUES (")
            .push_separated(columns, ", ", |sql, field| {
                sql.push_write_param(field.value, field.data_type.as_deref());
            })
            .push(")");

        self.db.execute(&sql.build()).await?;
        debug!(table = schema.table(), id = %id, "created record");
        self.refetch(schema, &id).await
    }

    async fn update_in(&self, schema: &TableSchema, id: &str, fields: &Fields) -> Result<Record> {
        let columns = self.stored_fields(schema, fields)?;

        let mut sql = SqlBuilder::new(self.db.dialect());
        sql.push("UPDATE ")
            .push_ident(schema.table())
            .push(" SET ")
            .push_separated(columns, ", ", |sql, field| {
                sql.push_ident(&field.column)
                    .push(" = ")
                    .push_write_param(field.value, field.data_type.as_deref());
            })
            .push(" WHERE ")
            .push_ident(&self.config.layout.record_id)
            .push(" = ")
            .push_param(SqlValue::Text(id.to_string()));

        let affected = self.db.execute(&sql.build()).await?;
        if affected == 0 {
            return Err(Error::NotFound(format!(
                "record {} not found in {}",
                id,
                schema.table()
            )));
        }
        debug!(table = schema.table(), id, "updated record");
        self.refetch(schema, id).await
    }

    async fn refetch(&self, schema: &TableSchema, id: &str) -> Result<Record> {
        fetch_record(self.db, schema, &self.config.layout, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("record {} not found in {}", id, schema.table())))
    }
}

fn check_update(id: &str, fields: &Fields) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::Validation("record id is required".into()));
    }
    if fields.is_empty() {
        return Err(Error::Validation("at least one field is required".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_update() {
        let fields = Fields::new().with("a", 1i64);
        assert!(check_update("recABCDEFGHIJ1234", &fields).is_ok());
        assert!(matches!(check_update(" ", &fields), Err(Error::Validation(_))));
        assert!(matches!(
            check_update("recABCDEFGHIJ1234", &Fields::new()),
            Err(Error::Validation(_))
        ));
    }
}
