//! JSON response types for the HTTP gateway.

use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status.
    pub status: String,
    /// Gateway version.
    pub version: String,
    /// Per-base connectivity, for bases opened so far.
    pub bases: Vec<BaseHealth>,
}

/// Connectivity of one base.
#[derive(Debug, Serialize)]
pub struct BaseHealth {
    pub name: String,
    pub connected: bool,
}
