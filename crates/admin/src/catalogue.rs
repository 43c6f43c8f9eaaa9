//! Product catalogue with an in-memory cache and an offline fallback.
//!
//! Product lists are cached per company using `moka`. On a miss the remote
//! store is queried and the offline mirror refreshed; when the remote store
//! is unreachable the mirror answers instead (and is not cached, so the next
//! request tries the remote again).

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use tracing::{debug, warn};

use bakery_core::{CompanyId, ProductId};

use crate::db::RepositoryError;
use crate::models::product::Product;
use crate::offline::sync::WasteRemote;
use crate::offline::{OfflineError, OfflineStore};

/// Where a catalogue answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogueSource {
    /// Fresh or cached remote data.
    Remote,
    /// The offline mirror, because the remote store is unreachable.
    Offline,
}

/// Errors raised while loading the catalogue.
#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    /// The remote store failed for a reason other than connectivity.
    #[error(transparent)]
    Remote(#[from] RepositoryError),
    /// The offline mirror failed while standing in for the remote store.
    #[error(transparent)]
    Offline(#[from] OfflineError),
}

/// A company's product list.
#[derive(Debug, Clone)]
pub struct CatalogueView {
    /// Products ordered by name.
    pub products: Arc<Vec<Product>>,
    /// Where they came from.
    pub source: CatalogueSource,
}

impl CatalogueView {
    /// Look up one product.
    #[must_use]
    pub fn find(&self, id: ProductId) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }
}

/// Cached product catalogue, cheap to clone.
#[derive(Clone)]
pub struct ProductCatalogue {
    cache: Cache<CompanyId, Arc<Vec<Product>>>,
}

impl ProductCatalogue {
    /// Create a catalogue whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1000).time_to_live(ttl).build();
        Self { cache }
    }

    /// Products of a company.
    ///
    /// # Errors
    ///
    /// Returns `CatalogueError::Remote` when the remote query fails for a
    /// reason other than connectivity, `CatalogueError::Offline` when the
    /// mirror fails while the remote is unreachable.
    pub async fn products<R: WasteRemote + Sync>(
        &self,
        remote: &R,
        store: &OfflineStore,
        company_id: CompanyId,
    ) -> Result<CatalogueView, CatalogueError> {
        if let Some(products) = self.cache.get(&company_id).await {
            debug!(company_id = %company_id, "Catalogue cache hit");
            return Ok(CatalogueView {
                products,
                source: CatalogueSource::Remote,
            });
        }

        match remote.fetch_products(company_id).await {
            Ok(products) => {
                if let Err(e) = store.replace_products(company_id, &products).await {
                    warn!(company_id = %company_id, error = %e, "Failed to refresh offline mirror");
                }
                let products = Arc::new(products);
                self.cache.insert(company_id, Arc::clone(&products)).await;
                Ok(CatalogueView {
                    products,
                    source: CatalogueSource::Remote,
                })
            }
            Err(e) if e.is_unavailable() => {
                warn!(company_id = %company_id, error = %e, "Remote store unreachable, serving offline catalogue");
                let products = store.products(company_id).await?;
                Ok(CatalogueView {
                    products: Arc::new(products),
                    source: CatalogueSource::Offline,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drop a company's cached list, after a write changed it.
    pub async fn invalidate(&self, company_id: CompanyId) {
        self.cache.invalidate(&company_id).await;
    }
}
