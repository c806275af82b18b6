//! airgres HTTP gateway.
//!
//! Serves the Airtable REST record API (`/v0/<base>/<table>`) over the
//! `airgres-core` record service. Each base is a logical database opened
//! lazily through the pool registry.

pub mod config;
pub mod error;
pub mod json;
pub mod routes;

pub use config::{Args, GatewayConfig};
pub use error::AppError;

use std::sync::Arc;

use airgres_core::{LinkMap, PoolRegistry, RecordService};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Pools keyed by base name.
    pub registry: Arc<PoolRegistry>,
    /// Linked field mapping, shared by every base.
    pub links: Arc<LinkMap>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl AppState {
    /// Create new application state.
    pub fn new(registry: Arc<PoolRegistry>, links: LinkMap, config: GatewayConfig) -> Self {
        Self {
            registry,
            links: Arc::new(links),
            config,
        }
    }

    /// Record service for `base`, opening its pool on first use.
    pub async fn service(&self, base: &str) -> Result<RecordService, AppError> {
        if !self.config.serves(base) {
            return Err(AppError::NotFound(format!("unknown base '{}'", base)));
        }
        let db = self.registry.get(base).await?;
        Ok(RecordService::new(
            db,
            self.links.clone(),
            self.config.service.clone(),
        ))
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout));

    Router::new()
        .merge(routes::health::routes())
        .merge(routes::records::routes())
        .layer(middleware)
        .with_state(state)
}
