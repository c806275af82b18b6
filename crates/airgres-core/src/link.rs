//! Linked-record resolution.
//!
//! A linked field stores target record ids, but callers usually filter on the
//! target's human-readable key (`{Report} = "R-001"`). The link map says which
//! table and column to look the key up in.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::StorageLayout;
use crate::error::{Error, Result};
use crate::record::is_record_id;
use crate::schema::normalize_identifier;
use crate::sql::{SqlBuilder, SqlValue};
use crate::store::Database;

/// Where a linked field's human-readable keys live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTarget {
    /// Target table.
    pub table: String,
    /// Column in the target table holding the human-readable key.
    #[serde(alias = "lookup_column")]
    pub lookup: String,
}

impl LinkTarget {
    pub fn new(table: impl Into<String>, lookup: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            lookup: lookup.into(),
        }
    }
}

/// Linked field name to target.
///
/// Loaded from JSON shaped like
/// `{"report_id": {"table": "reports", "lookup": "report_id"}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkMap(HashMap<String, LinkTarget>);

impl LinkMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, target: LinkTarget) -> Self {
        self.insert(field, target);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, target: LinkTarget) {
        self.0.insert(field.into(), target);
    }

    /// Target for `field`, matching the exact name first, then the normalized name.
    pub fn get(&self, field: &str) -> Option<&LinkTarget> {
        self.0.get(field).or_else(|| {
            let normalized = normalize_identifier(field);
            self.0
                .iter()
                .find(|(name, _)| normalize_identifier(name) == normalized)
                .map(|(_, target)| target)
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid link map: {}", e)))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read link map {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}

/// Outcome of resolving a filter value against a linked field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The value is, or maps to, this record id.
    Resolved(String),
    /// The field is not linked, or links back to the table being queried.
    NotALink,
    /// No target row matched, or the lookup failed.
    NotFound,
}

impl Resolution {
    pub fn record_id(&self) -> Option<&str> {
        match self {
            Resolution::Resolved(id) => Some(id),
            _ => None,
        }
    }
}

/// Resolves human-readable link keys to record ids.
pub struct LinkResolver<'a> {
    db: &'a dyn Database,
    links: &'a LinkMap,
    layout: &'a StorageLayout,
}

impl<'a> LinkResolver<'a> {
    pub fn new(db: &'a dyn Database, links: &'a LinkMap, layout: &'a StorageLayout) -> Self {
        Self { db, links, layout }
    }

    /// Resolve `value` for `field` while querying `current_table`.
    ///
    /// Never fails: lookup errors degrade to [`Resolution::NotFound`].
    pub async fn resolve(&self, field: &str, value: &str, current_table: &str) -> Resolution {
        if is_record_id(value) {
            return Resolution::Resolved(value.to_string());
        }

        let Some(target) = self.links.get(field) else {
            return Resolution::NotALink;
        };

        let target_table = normalize_identifier(&target.table);
        if target_table == normalize_identifier(current_table) {
            debug!(field, table = current_table, "link targets its own table, not resolving");
            return Resolution::NotALink;
        }

        match self.lookup(&target_table, &target.lookup, value).await {
            Ok(Some(id)) => Resolution::Resolved(id),
            Ok(None) => Resolution::NotFound,
            Err(e) => {
                warn!(field, table = %target_table, error = %e, "link lookup failed");
                Resolution::NotFound
            }
        }
    }

    async fn lookup(&self, table: &str, column: &str, value: &str) -> Result<Option<String>> {
        let mut sql = SqlBuilder::new(self.db.dialect());
        sql.push("SELECT ")
            .push_ident(&self.layout.record_id)
            .push(" FROM ")
            .push_ident(table)
            .push(" WHERE CAST(")
            .push_ident(column)
            .push(" AS TEXT) = ")
            .push_param(SqlValue::Text(value.to_string()))
            .push(" LIMIT 1");

        let rows = self.db.fetch_all(&sql.build()).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get(&self.layout.record_id))
            .and_then(|id| match id {
                SqlValue::Text(id) => Some(id.clone()),
                SqlValue::Int(id) => Some(id.to_string()),
                _ => None,
            }))
    }
}
