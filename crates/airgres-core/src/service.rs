//! The record service: one store, one link map, one configuration.

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::link::LinkMap;
use crate::mutation::MutationExecutor;
use crate::query::{ListOptions, Page, QueryExecutor};
use crate::record::{DeletedRecord, Record};
use crate::store::Database;
use crate::value::Fields;

/// Airtable-shaped operations over a relational store.
///
/// Cheap to clone; clones share the store and the link map.
#[derive(Clone)]
pub struct RecordService {
    db: Arc<dyn Database>,
    links: Arc<LinkMap>,
    config: ServiceConfig,
}

impl RecordService {
    pub fn new(db: Arc<dyn Database>, links: Arc<LinkMap>, config: ServiceConfig) -> Self {
        Self { db, links, config }
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn reader(&self) -> QueryExecutor<'_> {
        QueryExecutor::new(self.db.as_ref(), &self.links, &self.config)
    }

    fn writer(&self) -> MutationExecutor<'_> {
        MutationExecutor::new(self.db.as_ref(), &self.config)
    }

    pub async fn list(&self, table: &str, options: &ListOptions) -> Result<Page> {
        self.reader().list(table, options).await
    }

    pub async fn find(&self, table: &str, id: &str) -> Result<Record> {
        self.reader().find(table, id).await
    }

    pub async fn create(&self, table: &str, fields: &Fields) -> Result<Record> {
        self.writer().create(table, fields).await
    }

    pub async fn create_many(&self, table: &str, batch: &[Fields]) -> Result<Vec<Record>> {
        self.writer().create_many(table, batch).await
    }

    pub async fn update(&self, table: &str, id: &str, fields: &Fields) -> Result<Record> {
        self.writer().update(table, id, fields).await
    }

    pub async fn update_many(
        &self,
        table: &str,
        batch: &[(String, Fields)],
    ) -> Result<Vec<Record>> {
        self.writer().update_many(table, batch).await
    }

    pub async fn destroy(&self, table: &str, ids: &[String]) -> Result<Vec<DeletedRecord>> {
        self.writer().destroy(table, ids).await
    }
}
