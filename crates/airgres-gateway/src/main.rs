//! airgres HTTP gateway binary.

use std::sync::Arc;

use airgres_core::{
    Connector, LinkMap, PoolRegistry, PoolSettings, PostgresConnector, SqliteConnector,
};
use airgres_gateway::{create_router, AppState, Args, GatewayConfig};
use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line args
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "airgres_gateway=info,airgres_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from(&args);

    info!(
        listen = %config.listen_addr,
        bases = ?config.bases,
        "Starting airgres gateway"
    );

    if config.service.default_page_size > config.service.max_page_size {
        anyhow::bail!("default_page_size cannot exceed max_page_size");
    }

    let links = match &config.links_path {
        Some(path) => LinkMap::from_json_file(path)
            .with_context(|| format!("loading link map from {}", path.display()))?,
        None => LinkMap::new(),
    };
    info!(linked_fields = links.len(), "Link map loaded");

    let connector = connector_for(&config)?;
    let registry = Arc::new(PoolRegistry::new(connector));

    // Warm the configured bases; failures are retried on first request.
    for base in &config.bases {
        if let Err(e) = registry.get(base).await {
            warn!(base = %base, error = %e, "Base unavailable at startup");
        }
    }

    let state = AppState::new(registry.clone(), links, config.clone());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Gateway listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.shutdown().await;
    info!("Gateway stopped");
    Ok(())
}

fn connector_for(config: &GatewayConfig) -> anyhow::Result<Arc<dyn Connector>> {
    let url = config.database_url.as_str();
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        let settings = PoolSettings {
            max_connections: config.pool_max_connections,
            acquire_timeout: config.pool_acquire_timeout,
        };
        Ok(Arc::new(PostgresConnector::from_url(url, settings)?))
    } else if url == "sqlite::memory:" {
        Ok(Arc::new(SqliteConnector::in_memory()))
    } else if let Some(directory) = url.strip_prefix("sqlite://") {
        Ok(Arc::new(SqliteConnector::in_directory(directory)))
    } else {
        anyhow::bail!("unsupported database url '{}'", url)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
