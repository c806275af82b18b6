//! Service configuration.

use serde::{Deserialize, Serialize};

/// Default number of records per page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Upper bound on records per page.
pub const MAX_PAGE_SIZE: usize = 10_000;

/// Names of the bookkeeping columns every record table carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageLayout {
    /// Internal primary key, used as the sort tiebreaker. Never exposed.
    pub primary_key: String,
    /// Column holding the external record id.
    pub record_id: String,
    /// Column holding the creation timestamp.
    pub created_time: String,
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self {
            primary_key: "id".to_string(),
            record_id: "record_id".to_string(),
            created_time: "created_time".to_string(),
        }
    }
}

impl StorageLayout {
    /// Whether a column is bookkeeping rather than a user field.
    pub fn is_bookkeeping(&self, column: &str) -> bool {
        column == self.primary_key || column == self.record_id || column == self.created_time
    }
}

/// How unsupported formula syntax is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Drop unrecognized fragments with a warning.
    #[default]
    Lenient,
    /// Reject the request.
    Strict,
}

/// Record service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub layout: StorageLayout,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub filter_mode: FilterMode,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            layout: StorageLayout::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            filter_mode: FilterMode::Lenient,
        }
    }
}

impl ServiceConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage layout.
    pub fn with_layout(mut self, layout: StorageLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Set the page size used when the caller does not ask for one.
    pub fn with_default_page_size(mut self, size: usize) -> Self {
        self.default_page_size = size;
        self
    }

    /// Set the page size cap.
    pub fn with_max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = size;
        self
    }

    /// Set the filter mode.
    pub fn with_filter_mode(mut self, mode: FilterMode) -> Self {
        self.filter_mode = mode;
        self
    }

    /// Effective page size for a request.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        let max = self.max_page_size.max(1);
        requested.unwrap_or(self.default_page_size).clamp(1, max)
    }
}
