//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::catalogue::ProductCatalogue;
use crate::config::BakeryConfig;
use crate::offline::OfflineStore;
use crate::offline::sync::PgWasteRemote;

/// Application state shared across all handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: BakeryConfig,
    pool: PgPool,
    offline: OfflineStore,
    remote: PgWasteRemote,
    catalogue: ProductCatalogue,
}

impl AppState {
    /// Build the state from its parts.
    #[must_use]
    pub fn new(config: BakeryConfig, pool: PgPool, offline: OfflineStore) -> Self {
        let catalogue = ProductCatalogue::new(config.product_cache_ttl);
        let remote = PgWasteRemote::new(pool.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                offline,
                remote,
                catalogue,
            }),
        }
    }

    /// Loaded configuration.
    #[must_use]
    pub fn config(&self) -> &BakeryConfig {
        &self.inner.config
    }

    /// Remote store connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Local offline cache.
    #[must_use]
    pub fn offline(&self) -> &OfflineStore {
        &self.inner.offline
    }

    /// Remote side used for reconciliation and catalogue loads.
    #[must_use]
    pub fn remote(&self) -> &PgWasteRemote {
        &self.inner.remote
    }

    /// Cached product catalogue.
    #[must_use]
    pub fn catalogue(&self) -> &ProductCatalogue {
        &self.inner.catalogue
    }
}
