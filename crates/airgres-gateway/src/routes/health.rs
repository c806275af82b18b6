//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};

use crate::json::{BaseHealth, HealthResponse};
use crate::AppState;

/// Health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Health check handler. Only bases whose pool is already open are pinged.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut names = state.registry.names();
    names.sort();

    let mut bases = Vec::with_capacity(names.len());
    for name in names {
        let connected = match state.registry.get(&name).await {
            Ok(db) => db.ping().await.is_ok(),
            Err(_) => false,
        };
        bases.push(BaseHealth { name, connected });
    }

    let healthy = bases.iter().all(|b| b.connected);
    Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        bases,
    })
}
