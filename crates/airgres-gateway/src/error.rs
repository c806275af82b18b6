//! Error handling for the gateway.

use airgres_core::{ApiResponse, Status};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Unknown base or record.
    #[error("{0}")]
    NotFound(String),
    /// Malformed request.
    #[error("{0}")]
    BadRequest(String),
    /// Store or internal failure.
    #[error("{0}")]
    Internal(String),
}

/// HTTP status for a core status class.
pub fn status_code(status: Status) -> StatusCode {
    match status {
        Status::Ok => StatusCode::OK,
        Status::NotFound => StatusCode::NOT_FOUND,
        Status::BadRequest => StatusCode::UNPROCESSABLE_ENTITY,
        Status::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl AppError {
    fn status(&self) -> Status {
        match self {
            AppError::NotFound(_) => Status::NotFound,
            AppError::BadRequest(_) => Status::BadRequest,
            AppError::Internal(_) => Status::ServerError,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "error": {
                "type": status.error_type(),
                "message": self.to_string(),
            }
        });
        (status_code(status), Json(body)).into_response()
    }
}

impl From<airgres_core::Error> for AppError {
    fn from(err: airgres_core::Error) -> Self {
        match err.status() {
            Status::NotFound => AppError::NotFound(err.to_string()),
            Status::BadRequest => AppError::BadRequest(err.to_string()),
            Status::Ok | Status::ServerError => AppError::Internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("invalid JSON body: {}", err))
    }
}

/// Render a core response with its mapped HTTP status.
pub fn into_http(response: ApiResponse) -> Response {
    (status_code(response.status), Json(response.body)).into_response()
}
