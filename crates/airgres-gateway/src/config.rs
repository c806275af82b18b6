//! Gateway configuration.

use std::path::PathBuf;
use std::time::Duration;

use airgres_core::{FilterMode, ServiceConfig, StorageLayout};
use clap::Parser;

/// airgres HTTP gateway command line arguments.
#[derive(Debug, Parser)]
#[command(name = "airgres-gateway")]
#[command(about = "Airtable-compatible HTTP gateway over PostgreSQL or SQLite")]
pub struct Args {
    /// Address to listen on for HTTP requests.
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// Store URL: `postgres://...` (database name replaced per base),
    /// `sqlite://<directory>` (one `<base>.db` file per base) or `sqlite::memory:`.
    #[arg(long, env = "AIRGRES_DATABASE_URL", default_value = "sqlite::memory:")]
    pub database_url: String,

    /// Bases (logical databases) served under `/v0/<base>/...`.
    #[arg(long = "base", value_delimiter = ',', default_value = "main")]
    pub bases: Vec<String>,

    /// JSON file mapping linked fields to their target table and lookup column.
    #[arg(long)]
    pub links: Option<PathBuf>,

    /// Page size used when a request does not ask for one.
    #[arg(long, default_value_t = airgres_core::config::DEFAULT_PAGE_SIZE)]
    pub default_page_size: usize,

    /// Upper bound on page size.
    #[arg(long, default_value_t = airgres_core::config::MAX_PAGE_SIZE)]
    pub max_page_size: usize,

    /// Reject formulas with unsupported syntax instead of ignoring the unsupported parts.
    #[arg(long)]
    pub strict_filters: bool,

    /// Per-request timeout (ms).
    #[arg(long, default_value_t = 30_000)]
    pub request_timeout_ms: u64,

    /// Maximum pooled connections per base (PostgreSQL).
    #[arg(long, default_value_t = 10)]
    pub pool_max_connections: u32,

    /// Timeout (ms) when acquiring a pooled connection (PostgreSQL).
    #[arg(long, default_value_t = 5_000)]
    pub pool_acquire_timeout_ms: u64,

    /// Internal primary key column, used as the sort tiebreaker.
    #[arg(long, default_value = "id")]
    pub primary_key_column: String,

    /// Column holding record ids.
    #[arg(long, default_value = "record_id")]
    pub record_id_column: String,

    /// Column holding creation timestamps.
    #[arg(long, default_value = "created_time")]
    pub created_time_column: String,
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to listen on for HTTP requests.
    pub listen_addr: String,
    /// Store URL.
    pub database_url: String,
    /// Bases served by this gateway.
    pub bases: Vec<String>,
    /// Link map file.
    pub links_path: Option<PathBuf>,
    /// Per-request timeout enforced at the gateway.
    pub request_timeout: Duration,
    /// Maximum pooled connections per base.
    pub pool_max_connections: u32,
    /// Timeout when acquiring a pooled connection.
    pub pool_acquire_timeout: Duration,
    /// Record service settings.
    pub service: ServiceConfig,
}

impl GatewayConfig {
    /// Whether `base` is served by this gateway.
    pub fn serves(&self, base: &str) -> bool {
        self.bases.iter().any(|b| b == base)
    }
}

impl From<&Args> for GatewayConfig {
    fn from(args: &Args) -> Self {
        let layout = StorageLayout {
            primary_key: args.primary_key_column.clone(),
            record_id: args.record_id_column.clone(),
            created_time: args.created_time_column.clone(),
        };
        let filter_mode = if args.strict_filters {
            FilterMode::Strict
        } else {
            FilterMode::Lenient
        };

        Self {
            listen_addr: args.listen.clone(),
            database_url: args.database_url.clone(),
            bases: args.bases.clone(),
            links_path: args.links.clone(),
            request_timeout: Duration::from_millis(args.request_timeout_ms),
            pool_max_connections: args.pool_max_connections,
            pool_acquire_timeout: Duration::from_millis(args.pool_acquire_timeout_ms),
            service: ServiceConfig::new()
                .with_layout(layout)
                .with_default_page_size(args.default_page_size)
                .with_max_page_size(args.max_page_size)
                .with_filter_mode(filter_mode),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            database_url: "sqlite::memory:".to_string(),
            bases: vec!["main".to_string()],
            links_path: None,
            request_timeout: Duration::from_secs(30),
            pool_max_connections: 10,
            pool_acquire_timeout: Duration::from_secs(5),
            service: ServiceConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_to_config() {
        let args = Args::parse_from([
            "airgres-gateway",
            "--base",
            "sales,ops",
            "--strict-filters",
            "--max-page-size",
            "500",
            "--record-id-column",
            "rid",
        ]);
        let config = GatewayConfig::from(&args);

        assert_eq!(config.bases, vec!["sales", "ops"]);
        assert!(config.serves("ops"));
        assert!(!config.serves("main"));
        assert_eq!(config.service.filter_mode, FilterMode::Strict);
        assert_eq!(config.service.max_page_size, 500);
        assert_eq!(config.service.layout.record_id, "rid");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
