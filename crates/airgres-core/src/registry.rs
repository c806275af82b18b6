//! Lazily-initialized, process-wide pool registry keyed by database name.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::info;

use crate::error::Result;
use crate::store::Database;

/// Opens a store for a logical database name.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, name: &str) -> Result<Arc<dyn Database>>;
}

type Slot = Arc<OnceCell<Arc<dyn Database>>>;

/// At most one pool per database name.
///
/// Concurrent first requests for the same name share a single initialization;
/// a failed initialization leaves the slot empty so a later request retries.
pub struct PoolRegistry {
    connector: Arc<dyn Connector>,
    pools: DashMap<String, Slot>,
}

impl PoolRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            pools: DashMap::new(),
        }
    }

    /// Get the pool for `name`, opening it on first use.
    pub async fn get(&self, name: &str) -> Result<Arc<dyn Database>> {
        // Clone the slot out so no map guard is held across the await.
        let slot: Slot = self.pools.entry(name.to_string()).or_default().clone();
        let db = slot
            .get_or_try_init(|| async {
                info!(database = name, "initializing connection pool");
                self.connector.connect(name).await
            })
            .await?;
        Ok(Arc::clone(db))
    }

    /// Install an already-open store under `name`.
    ///
    /// Returns `false` if a pool for `name` was already initialized.
    pub fn register(&self, name: &str, db: Arc<dyn Database>) -> bool {
        let slot: Slot = self.pools.entry(name.to_string()).or_default().clone();
        slot.set(db).is_ok()
    }

    /// Whether a pool for `name` has been opened.
    pub fn is_initialized(&self, name: &str) -> bool {
        self.pools
            .get(name)
            .map(|slot| slot.initialized())
            .unwrap_or(false)
    }

    /// Names of the opened pools.
    pub fn names(&self) -> Vec<String> {
        self.pools
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Close every pool and forget it.
    pub async fn shutdown(&self) {
        let slots: Vec<(String, Slot)> = self
            .pools
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        self.pools.clear();

        for (name, slot) in slots {
            if let Some(db) = slot.get() {
                db.close().await;
                info!(database = %name, "connection pool closed");
            }
        }
    }
}
