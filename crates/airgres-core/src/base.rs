//! Fluent client in the shape of the Airtable JavaScript client.
//!
//! ```no_run
//! # async fn demo(service: airgres_core::RecordService) -> airgres_core::Result<()> {
//! use airgres_core::{Base, SelectOptions};
//!
//! let base = Base::new(service);
//! let reports = base
//!     .table("Reports")
//!     .select(SelectOptions::new().filter(r#"{Status} = "active""#))
//!     .all()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::ops::ControlFlow;

use crate::error::Result;
use crate::query::{ListOptions, Page, SortSpec};
use crate::record::{DeletedRecord, Record};
use crate::service::RecordService;
use crate::value::Fields;

/// Options for [`TableRef::select`].
pub type SelectOptions = ListOptions;

/// Entry point: a handle on one record service.
#[derive(Clone)]
pub struct Base {
    service: RecordService,
}

impl Base {
    pub fn new(service: RecordService) -> Self {
        Self { service }
    }

    pub fn table(&self, name: impl Into<String>) -> TableRef {
        TableRef {
            service: self.service.clone(),
            name: name.into(),
        }
    }
}

/// A table within a [`Base`].
#[derive(Clone)]
pub struct TableRef {
    service: RecordService,
    name: String,
}

impl TableRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn select(&self, options: SelectOptions) -> Select {
        Select {
            service: self.service.clone(),
            table: self.name.clone(),
            options,
        }
    }

    pub async fn find(&self, id: &str) -> Result<Record> {
        self.service.find(&self.name, id).await
    }

    pub async fn create(&self, fields: Fields) -> Result<Record> {
        self.service.create(&self.name, &fields).await
    }

    pub async fn update(&self, id: &str, fields: Fields) -> Result<Record> {
        self.service.update(&self.name, id, &fields).await
    }

    pub async fn destroy(&self, ids: &[String]) -> Result<Vec<DeletedRecord>> {
        self.service.destroy(&self.name, ids).await
    }
}

/// A pending listing.
pub struct Select {
    service: RecordService,
    table: String,
    options: ListOptions,
}

impl Select {
    /// Add a sort key.
    pub fn sort(mut self, spec: SortSpec) -> Self {
        self.options.sort.push(spec);
        self
    }

    /// The first page only.
    pub async fn first_page(&self) -> Result<Vec<Record>> {
        let mut options = self.options.clone();
        options.offset = None;
        Ok(self.service.list(&self.table, &options).await?.records)
    }

    /// Visit pages in order until the cursor runs out or `visit` breaks.
    pub async fn each_page<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&[Record]) -> ControlFlow<()>,
    {
        let mut options = self.options.clone();
        loop {
            let Page { records, offset } = self.service.list(&self.table, &options).await?;
            if visit(&records).is_break() {
                return Ok(());
            }
            match offset {
                Some(next) => options.offset = Some(next),
                None => return Ok(()),
            }
        }
    }

    /// Every page, concatenated.
    pub async fn all(&self) -> Result<Vec<Record>> {
        let mut all = Vec::new();
        self.each_page(|records| {
            all.extend_from_slice(records);
            ControlFlow::Continue(())
        })
        .await?;
        Ok(all)
    }
}
