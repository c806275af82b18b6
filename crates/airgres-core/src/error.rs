//! Core error types.

use crate::api::Status;
use thiserror::Error;

/// Errors raised by the record service.
#[derive(Debug, Error)]
pub enum Error {
    /// The addressed record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller error: bad parameters, bad cursor, missing id or fields.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The table or field does not exist in the store.
    #[error("schema not found: {0}")]
    SchemaNotFound(String),

    /// Failure reported by the storage backend.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// Invalid service or connection configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias for core operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Reclassify a schema miss for a single-record read: it becomes not-found.
    pub fn on_read(self) -> Self {
        match self {
            Error::SchemaNotFound(msg) => Error::NotFound(msg),
            other => other,
        }
    }

    /// Reclassify a schema miss for a write: it becomes an upstream failure.
    pub fn on_write(self) -> Self {
        match self {
            Error::SchemaNotFound(msg) => Error::Upstream(msg),
            other => other,
        }
    }

    /// Status class used by the request facade.
    pub fn status(&self) -> Status {
        match self {
            Error::NotFound(_) | Error::SchemaNotFound(_) => Status::NotFound,
            Error::Validation(_) => Status::BadRequest,
            Error::Upstream(_) | Error::Config(_) => Status::ServerError,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Upstream(format!("sqlite: {}", err))
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Upstream(format!("postgres: {}", err))
    }
}
