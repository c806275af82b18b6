//! Storage adapters.
//!
//! Every executor talks to the store through [`Database`]: a parameterized
//! statement goes in, rows or an affected-row count come out. The SQL dialect
//! is exposed so statement builders can pick placeholder syntax and the
//! substring function.

use crate::error::Result;
use crate::sql::{Dialect, Row, Statement};
use async_trait::async_trait;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub use postgres::{PoolSettings, PostgresConnector, PostgresDatabase};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConnector, SqliteDatabase};

/// A column as reported by the store's catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Storage type name (`udt_name` on Postgres, declared type on SQLite).
    pub data_type: Option<String>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: Option<String>) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// A relational store reachable through parameterized SQL.
#[async_trait]
pub trait Database: Send + Sync {
    /// SQL dialect spoken by this store.
    fn dialect(&self) -> Dialect;

    /// Run a statement and collect every returned row.
    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Row>>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&self, statement: &Statement) -> Result<u64>;

    /// Columns of `table` in declaration order; empty when the table does not exist.
    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Round-trip a trivial query.
    async fn ping(&self) -> Result<()>;

    /// Release pooled connections.
    async fn close(&self);
}
