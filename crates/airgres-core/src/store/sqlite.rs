//! SQLite adapter.
//!
//! A single connection behind a mutex; statements run on the blocking pool so
//! the async executors never stall the runtime. Booleans are bound as the
//! texts `true` and `false`, which SQLite keeps verbatim in any column.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqliteValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info};

use super::{ColumnInfo, Database};
use crate::error::{Error, Result};
use crate::registry::Connector;
use crate::schema::normalize_identifier;
use crate::sql::{format_timestamp, Dialect, Row, SqlValue, Statement};

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run a batch of `;`-separated statements, e.g. DDL.
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.run(move |conn| conn.execute_batch(&sql)).await
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let result = tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| Error::Upstream(format!("sqlite worker failed: {}", e)))?;
        Ok(result?)
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Row>> {
        debug!(sql = %statement.sql, params = statement.params.len(), "sqlite query");
        let sql = statement.sql.clone();
        let params = statement.params.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let mut rows = stmt.query(params_from_iter(params.iter()))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut record = Row::with_capacity(names.len());
                for (i, name) in names.iter().enumerate() {
                    record.insert(name.clone(), from_value_ref(row.get_ref(i)?));
                }
                out.push(record);
            }
            Ok(out)
        })
        .await
    }

    async fn execute(&self, statement: &Statement) -> Result<u64> {
        debug!(sql = %statement.sql, params = statement.params.len(), "sqlite execute");
        let sql = statement.sql.clone();
        let params = statement.params.clone();
        let affected = self
            .run(move |conn| conn.execute(&sql, params_from_iter(params.iter())))
            .await?;
        Ok(affected as u64)
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let table = table.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info(?1)")?;
            let columns = stmt
                .query_map([&table], |row| {
                    let name: String = row.get(0)?;
                    let data_type: Option<String> = row.get(1)?;
                    Ok(ColumnInfo::new(
                        name,
                        data_type.filter(|t| !t.trim().is_empty()),
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(columns)
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.run(|conn| conn.query_row("SELECT 1", [], |_| Ok(())))
            .await
    }

    async fn close(&self) {
        debug!("sqlite connection released");
    }
}

fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Int(i),
        ValueRef::Real(f) => SqlValue::Float(f),
        ValueRef::Text(bytes) => SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => SqlValue::Text(hex::encode(bytes)),
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(SqliteValue::Null),
            SqlValue::Bool(b) => {
                let text = if *b { "true" } else { "false" };
                ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes()))
            }
            SqlValue::Int(i) => ToSqlOutput::Owned(SqliteValue::Integer(*i)),
            SqlValue::Float(f) => ToSqlOutput::Owned(SqliteValue::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Json(v) => ToSqlOutput::Owned(SqliteValue::Text(v.to_string())),
            SqlValue::Timestamp(ts) => ToSqlOutput::Owned(SqliteValue::Text(format_timestamp(ts))),
        })
    }
}

/// Opens one SQLite database per logical name.
///
/// With a directory, database `name` lives at `<dir>/<name>.db`; without one,
/// every database is a fresh in-memory store.
#[derive(Debug, Clone, Default)]
pub struct SqliteConnector {
    directory: Option<PathBuf>,
}

impl SqliteConnector {
    pub fn in_memory() -> Self {
        Self { directory: None }
    }

    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: Some(directory.into()),
        }
    }

    fn path_for(&self, name: &str) -> Option<PathBuf> {
        self.directory
            .as_ref()
            .map(|dir| dir.join(format!("{}.db", normalize_identifier(name))))
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    async fn connect(&self, name: &str) -> Result<Arc<dyn Database>> {
        let db = match self.path_for(name) {
            Some(path) => {
                info!(database = name, path = %path.display(), "opening sqlite database");
                SqliteDatabase::open(path)?
            }
            None => {
                info!(database = name, "opening in-memory sqlite database");
                SqliteDatabase::open_in_memory()?
            }
        };
        Ok(Arc::new(db))
    }
}
