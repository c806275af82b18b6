//! PostgreSQL adapter backed by an sqlx connection pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _, TypeInfo};
use tracing::{debug, info};

use super::{ColumnInfo, Database};
use crate::error::{Error, Result};
use crate::registry::Connector;
use crate::sql::{Dialect, Row, SqlValue, Statement};

const DESCRIBE_TABLE_SQL: &str = r#"
SELECT c.column_name::text, c.udt_name::text, c.table_schema::text
FROM information_schema.columns c
WHERE c.table_name = $1
  AND c.table_schema = ANY(current_schemas(false))
ORDER BY array_position(current_schemas(false), c.table_schema::name), c.ordinal_position
"#;

/// Pool sizing for Postgres connections.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    /// Connect to the database named in `url`.
    pub async fn connect(url: &str, settings: &PoolSettings) -> Result<Self> {
        let options: PgConnectOptions = url
            .parse()
            .map_err(|e| Error::Config(format!("invalid postgres url: {}", e)))?;
        Self::connect_with(options, settings).await
    }

    pub async fn connect_with(options: PgConnectOptions, settings: &PoolSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn query<'q>(statement: &'q Statement) -> Query<'q, Postgres, PgArguments> {
        statement
            .params
            .iter()
            .fold(sqlx::query(&statement.sql), bind_value)
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Row>> {
        debug!(sql = %statement.sql, params = statement.params.len(), "postgres query");
        let rows = Self::query(statement).fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, statement: &Statement) -> Result<u64> {
        debug!(sql = %statement.sql, params = statement.params.len(), "postgres execute");
        let result = Self::query(statement).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let rows = sqlx::query(DESCRIBE_TABLE_SQL)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        // A table name can exist in several schemas on the search path; the
        // first one wins, as it would for an unqualified query.
        let mut first_schema: Option<String> = None;
        let mut columns = Vec::new();
        for row in &rows {
            let schema: String = row.try_get(2)?;
            match &first_schema {
                None => first_schema = Some(schema),
                Some(first) if *first != schema => continue,
                Some(_) => {}
            }
            let name: String = row.try_get(0)?;
            let data_type: Option<String> = row.try_get(1)?;
            columns.push(ColumnInfo::new(name, data_type));
        }
        Ok(columns)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(i) => query.bind(*i),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Json(v) => query.bind(sqlx::types::Json(v.clone())),
        SqlValue::Timestamp(ts) => query.bind(*ts),
    }
}

/// How a result column is pulled out of a row, keyed by sqlx type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnDecoder {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Json,
    Uuid,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Text,
    BoolArray,
    Int2Array,
    Int4Array,
    Int8Array,
    Float4Array,
    Float8Array,
    TextArray,
    UuidArray,
}

impl ColumnDecoder {
    /// Anything not listed must be selected through a text cast; it then
    /// arrives as `TEXT` and decodes as text.
    fn for_type(type_name: &str) -> Self {
        match type_name {
            "BOOL" => Self::Bool,
            "INT2" => Self::Int2,
            "INT4" => Self::Int4,
            "INT8" => Self::Int8,
            "FLOAT4" => Self::Float4,
            "FLOAT8" => Self::Float8,
            "NUMERIC" => Self::Numeric,
            "JSON" | "JSONB" => Self::Json,
            "UUID" => Self::Uuid,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "TIMESTAMP" => Self::Timestamp,
            "TIMESTAMPTZ" => Self::TimestampTz,
            "BOOL[]" => Self::BoolArray,
            "INT2[]" => Self::Int2Array,
            "INT4[]" => Self::Int4Array,
            "INT8[]" => Self::Int8Array,
            "FLOAT4[]" => Self::Float4Array,
            "FLOAT8[]" => Self::Float8Array,
            "TEXT[]" | "VARCHAR[]" | "CHAR[]" | "NAME[]" => Self::TextArray,
            "UUID[]" => Self::UuidArray,
            _ => Self::Text,
        }
    }
}

fn decode_row(row: &PgRow) -> Result<Row> {
    row.columns()
        .iter()
        .map(|column| {
            let type_name = column.type_info().name();
            let value = decode_column(row, column.ordinal(), ColumnDecoder::for_type(type_name))
                .map_err(|e| {
                    Error::Upstream(format!(
                        "cannot decode column '{}' of type {}: {}",
                        column.name(),
                        type_name,
                        e
                    ))
                })?;
            Ok((column.name().to_string(), value))
        })
        .collect()
}

fn decode_column(
    row: &PgRow,
    index: usize,
    decoder: ColumnDecoder,
) -> std::result::Result<SqlValue, sqlx::Error> {
    fn get<'r, T>(row: &'r PgRow, index: usize) -> std::result::Result<Option<T>, sqlx::Error>
    where
        T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    {
        row.try_get::<Option<T>, _>(index)
    }

    fn list<'r, T>(row: &'r PgRow, index: usize) -> std::result::Result<Option<SqlValue>, sqlx::Error>
    where
        T: serde::Serialize,
        Vec<Option<T>>: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    {
        Ok(get::<Vec<Option<T>>>(row, index)?
            .map(|items| SqlValue::Json(serde_json::json!(items))))
    }

    let value = match decoder {
        ColumnDecoder::Bool => get::<bool>(row, index)?.map(SqlValue::Bool),
        ColumnDecoder::Int2 => get::<i16>(row, index)?.map(|v| SqlValue::Int(v.into())),
        ColumnDecoder::Int4 => get::<i32>(row, index)?.map(|v| SqlValue::Int(v.into())),
        ColumnDecoder::Int8 => get::<i64>(row, index)?.map(SqlValue::Int),
        ColumnDecoder::Float4 => get::<f32>(row, index)?.map(|v| SqlValue::Float(v.into())),
        ColumnDecoder::Float8 => get::<f64>(row, index)?.map(SqlValue::Float),
        ColumnDecoder::Numeric => get::<sqlx::types::Decimal>(row, index)?.map(|d| {
            let text = d.to_string();
            text.parse::<f64>().map_or(SqlValue::Text(text), SqlValue::Float)
        }),
        ColumnDecoder::Json => get::<serde_json::Value>(row, index)?.map(SqlValue::Json),
        ColumnDecoder::Uuid => {
            get::<sqlx::types::Uuid>(row, index)?.map(|u| SqlValue::Text(u.to_string()))
        }
        ColumnDecoder::Date => {
            get::<chrono::NaiveDate>(row, index)?.map(|d| SqlValue::Text(d.to_string()))
        }
        ColumnDecoder::Time => {
            get::<chrono::NaiveTime>(row, index)?.map(|t| SqlValue::Text(t.to_string()))
        }
        ColumnDecoder::Timestamp => {
            get::<chrono::NaiveDateTime>(row, index)?.map(|ts| SqlValue::Timestamp(ts.and_utc()))
        }
        ColumnDecoder::TimestampTz => {
            get::<chrono::DateTime<chrono::Utc>>(row, index)?.map(SqlValue::Timestamp)
        }
        ColumnDecoder::Text => get::<String>(row, index)?.map(SqlValue::Text),
        ColumnDecoder::BoolArray => list::<bool>(row, index)?,
        ColumnDecoder::Int2Array => list::<i16>(row, index)?,
        ColumnDecoder::Int4Array => list::<i32>(row, index)?,
        ColumnDecoder::Int8Array => list::<i64>(row, index)?,
        ColumnDecoder::Float4Array => list::<f32>(row, index)?,
        ColumnDecoder::Float8Array => list::<f64>(row, index)?,
        ColumnDecoder::TextArray => list::<String>(row, index)?,
        ColumnDecoder::UuidArray => get::<Vec<Option<sqlx::types::Uuid>>>(row, index)?.map(|ids| {
            let ids: Vec<Option<String>> = ids
                .into_iter()
                .map(|id| id.map(|id| id.to_string()))
                .collect();
            SqlValue::Json(serde_json::json!(ids))
        }),
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

/// Opens one pool per logical database name, sharing the base options.
#[derive(Debug, Clone)]
pub struct PostgresConnector {
    options: PgConnectOptions,
    settings: PoolSettings,
}

impl PostgresConnector {
    /// Build a connector from a base URL; its database name is replaced per connection.
    pub fn from_url(url: &str, settings: PoolSettings) -> Result<Self> {
        let options: PgConnectOptions = url
            .parse()
            .map_err(|e| Error::Config(format!("invalid postgres url: {}", e)))?;
        Ok(Self { options, settings })
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(&self, name: &str) -> Result<Arc<dyn Database>> {
        info!(database = name, max_connections = self.settings.max_connections, "opening postgres pool");
        let options = self.options.clone().database(name);
        let db = PostgresDatabase::connect_with(options, &self.settings).await?;
        Ok(Arc::new(db))
    }
}
