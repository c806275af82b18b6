//! Airtable-shaped record interface over relational stores.
//!
//! `airgres-core` translates the Airtable data API (filter formulas, sorted
//! and paginated listings, linked-record lookups, record CRUD) into
//! parameterized SQL against PostgreSQL or SQLite.
//!
//! # Layout
//!
//! Each table exposed as records carries three bookkeeping columns (see
//! [`StorageLayout`]): an integer primary key used as the ordering tiebreak,
//! an opaque record id (`rec` + 14 alphanumerics), and a creation timestamp.
//! Every other column is a field, exposed under its own name.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use airgres_core::{ListOptions, LinkMap, RecordService, ServiceConfig, SqliteDatabase};
//!
//! # async fn demo() -> airgres_core::Result<()> {
//! let db = SqliteDatabase::open("airgres.db")?;
//! let service = RecordService::new(Arc::new(db), Arc::new(LinkMap::new()), ServiceConfig::default());
//!
//! let page = service
//!     .list("Reports", &ListOptions::new().filter(r#"{Status} = "active""#).page_size(50))
//!     .await?;
//! for record in &page.records {
//!     println!("{} {:?}", record.id, record.fields.get_text("title"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod base;
pub mod codec;
pub mod config;
pub mod error;
pub mod link;
pub mod mutation;
pub mod query;
pub mod record;
pub mod registry;
pub mod schema;
pub mod service;
pub mod sql;
pub mod store;
pub mod translate;
pub mod value;

pub use api::{ApiRequest, ApiResponse, Method, Status};
pub use base::{Base, Select, SelectOptions, TableRef};
pub use config::{FilterMode, ServiceConfig, StorageLayout};
pub use error::{Error, Result};
pub use link::{LinkMap, LinkTarget, Resolution};
pub use query::{ListOptions, Page, PaginationCursor, SortDirection, SortSpec};
pub use record::{generate_record_id, is_record_id, DeletedRecord, Record};
pub use registry::{Connector, PoolRegistry};
pub use schema::normalize_identifier;
pub use service::RecordService;
pub use sql::Dialect;
pub use store::{ColumnInfo, Database};
pub use value::{FieldValue, Fields};

#[cfg(feature = "postgres")]
pub use store::{PoolSettings, PostgresConnector, PostgresDatabase};
#[cfg(feature = "sqlite")]
pub use store::{SqliteConnector, SqliteDatabase};
