//! Offline-first waste entry.
//!
//! Every write goes to the remote store first. When the remote store is
//! unreachable the record is kept in the offline cache, flagged unsynced, and
//! the reconciliation pass pushes it later. Reads merge remote records with
//! local ones that have not been pushed yet.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use bakery_core::{CompanyId, ProductId, SyncStatus, WasteRecordId};

use crate::catalogue::{CatalogueError, CatalogueSource, ProductCatalogue};
use crate::db::{RepositoryError, UpsertOutcome};
use crate::models::product::consolidate_adjustments;
use crate::models::waste::{
    CreateWasteInput, WasteEntryResult, WasteFilter, WasteRecord, stock_movements,
};
use crate::offline::sync::{Reconciler, SyncError, SyncReport, WasteRemote};
use crate::offline::{OfflineError, OfflineStore};

/// Errors from waste operations.
#[derive(Debug, Error)]
pub enum WasteError {
    /// The entry failed validation.
    #[error("{0}")]
    Invalid(String),

    /// The product is not in the company's catalogue.
    #[error("unknown product {0}")]
    UnknownProduct(ProductId),

    /// The remote store holds a newer version of the record.
    #[error("a newer version of this waste record already exists")]
    Stale,

    /// Remote store error.
    #[error(transparent)]
    Remote(#[from] RepositoryError),

    /// Offline cache error.
    #[error(transparent)]
    Offline(#[from] OfflineError),
}

impl From<CatalogueError> for WasteError {
    fn from(err: CatalogueError) -> Self {
        match err {
            CatalogueError::Remote(e) => Self::Remote(e),
            CatalogueError::Offline(e) => Self::Offline(e),
        }
    }
}

/// Waste records for a listing, and whether the remote store answered.
#[derive(Debug, Clone, Serialize)]
pub struct WasteListing {
    /// Matching records, most recent first.
    pub records: Vec<WasteRecord>,
    /// `offline` when only the local cache could be read.
    pub source: CatalogueSource,
}

/// Waste operations over a remote store, the offline cache and the catalogue.
pub struct WasteService<'a, R> {
    remote: &'a R,
    store: &'a OfflineStore,
    catalogue: &'a ProductCatalogue,
}

impl<'a, R: WasteRemote + Sync> WasteService<'a, R> {
    /// Create a service over its collaborators.
    #[must_use]
    pub const fn new(remote: &'a R, store: &'a OfflineStore, catalogue: &'a ProductCatalogue) -> Self {
        Self {
            remote,
            store,
            catalogue,
        }
    }

    /// Record a waste entry.
    ///
    /// The result says whether the record reached the remote store. When it
    /// did not, the record is cached locally and the mirrored stock is
    /// adjusted so that offline reads stay consistent.
    ///
    /// # Errors
    ///
    /// Returns `WasteError::Invalid` or `WasteError::UnknownProduct` for bad
    /// input, `WasteError::Stale` if the remote holds a newer version, and
    /// `WasteError::Remote` when the remote rejects the record for a reason
    /// other than connectivity. Nothing is cached in those cases.
    #[instrument(skip(self, input), fields(company_id = %company_id, product_id = %input.product_id))]
    pub async fn record(
        &self,
        company_id: CompanyId,
        operator: &str,
        input: &CreateWasteInput,
        now: DateTime<Utc>,
    ) -> Result<WasteEntryResult, WasteError> {
        let record = WasteRecord::new(company_id, operator, input, now).map_err(WasteError::Invalid)?;

        let catalogue = self
            .catalogue
            .products(self.remote, self.store, company_id)
            .await?;
        if catalogue.find(record.product_id).is_none() {
            return Err(WasteError::UnknownProduct(record.product_id));
        }

        let previous = self.store.waste_record(company_id, record.id).await?;

        match self.remote.push_waste(&record).await {
            Ok(UpsertOutcome::Stale) => Err(WasteError::Stale),
            Ok(outcome) => {
                let record = record.with_sync_status(SyncStatus::Synced);
                self.store.clear_deletion(company_id, record.id).await?;
                self.cache(previous.as_ref(), &record).await?;
                self.catalogue.invalidate(company_id).await;
                info!(waste_id = %record.id, ?outcome, "Waste recorded");
                Ok(WasteEntryResult {
                    record,
                    synced: true,
                })
            }
            Err(e) if e.is_unavailable() => {
                warn!(waste_id = %record.id, error = %e, "Remote store unreachable, waste kept offline");
                self.cache(previous.as_ref(), &record).await?;
                Ok(WasteEntryResult {
                    record,
                    synced: false,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Waste records matching `filter`.
    ///
    /// Local records not pushed yet are merged into the remote answer and
    /// win over their remote version, and records deleted offline are left
    /// out. When the remote store is unreachable the offline cache answers
    /// alone.
    ///
    /// # Errors
    ///
    /// Returns `WasteError::Remote` for remote failures other than
    /// connectivity, `WasteError::Offline` if the cache cannot be read.
    #[instrument(skip(self, filter), fields(company_id = %company_id))]
    pub async fn list(
        &self,
        company_id: CompanyId,
        filter: &WasteFilter,
    ) -> Result<WasteListing, WasteError> {
        let (mut records, source) = match self.remote.list_waste(company_id, filter).await {
            Ok(remote) => {
                let deleted: HashSet<WasteRecordId> = self
                    .store
                    .pending_deletions(company_id)
                    .await?
                    .into_iter()
                    .collect();
                let remote = remote.into_iter().filter(|r| !deleted.contains(&r.id)).collect();
                let pending = self.store.unsynced_waste(company_id).await?;
                (merge_pending(remote, pending, filter), CatalogueSource::Remote)
            }
            Err(e) if e.is_unavailable() => {
                warn!(error = %e, "Remote store unreachable, listing offline waste");
                let cached = self
                    .store
                    .waste_records(company_id)
                    .await?
                    .into_iter()
                    .filter(|r| filter.matches(r))
                    .collect();
                (cached, CatalogueSource::Offline)
            }
            Err(e) => return Err(e.into()),
        };

        records.sort_by(|a, b| {
            b.recorded_at
                .cmp(&a.recorded_at)
                .then_with(|| a.id.as_uuid().cmp(&b.id.as_uuid()))
        });
        if let Some(limit) = filter.limit.and_then(|l| usize::try_from(l).ok()) {
            records.truncate(limit);
        }

        Ok(WasteListing { records, source })
    }

    /// Delete a waste record and give its quantity back to stock.
    ///
    /// A record with unsynced local changes is removed locally even while
    /// the remote store is unreachable. Its remote copy, if any, is then
    /// deleted by the next reconciliation pass. A synced record needs the
    /// remote store.
    ///
    /// # Returns
    ///
    /// Returns `true` if the record was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `WasteError::Remote` if the remote delete fails, including
    /// for connectivity when the record was already synced.
    #[instrument(skip(self), fields(company_id = %company_id, waste_id = %id))]
    pub async fn delete(&self, company_id: CompanyId, id: WasteRecordId) -> Result<bool, WasteError> {
        let local = self.store.waste_record(company_id, id).await?;

        if let Some(pending) = local.as_ref().filter(|r| !r.sync_status.is_synced()) {
            self.uncache(pending).await?;
            match self.remote.remove_waste(company_id, id).await {
                Ok(found) => debug!(found, "Remote copy removed"),
                Err(e) => {
                    warn!(error = %e, "Remote delete failed, kept for the next sync");
                    self.store.mark_deleted(company_id, id, Utc::now()).await?;
                }
            }
            self.catalogue.invalidate(company_id).await;
            return Ok(true);
        }

        let found = self.remote.remove_waste(company_id, id).await?;
        if let Some(ref cached) = local {
            self.uncache(cached).await?;
        }
        if found {
            self.catalogue.invalidate(company_id).await;
            info!("Waste record deleted");
        }

        Ok(found || local.is_some())
    }

    /// Run a reconciliation pass, then drop the cached catalogue so that the
    /// pulled stock is served.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::run`].
    pub async fn sync(&self, company_id: CompanyId) -> Result<SyncReport, SyncError> {
        let report = Reconciler::new(self.store, self.remote).run(company_id).await;
        self.catalogue.invalidate(company_id).await;
        report
    }

    /// Store a record locally and move the mirrored stock accordingly.
    async fn cache(&self, previous: Option<&WasteRecord>, record: &WasteRecord) -> Result<(), WasteError> {
        if !self.store.put_waste(record).await? {
            return Ok(());
        }
        self.move_cached_stock(record.company_id, previous, Some(record)).await
    }

    /// Remove a record locally and give its quantity back to the mirror.
    async fn uncache(&self, record: &WasteRecord) -> Result<(), WasteError> {
        if self.store.delete_waste(record.company_id, record.id).await? {
            self.move_cached_stock(record.company_id, Some(record), None)
                .await?;
        }
        Ok(())
    }

    async fn move_cached_stock(
        &self,
        company_id: CompanyId,
        previous: Option<&WasteRecord>,
        next: Option<&WasteRecord>,
    ) -> Result<(), WasteError> {
        for movement in consolidate_adjustments(&stock_movements(previous, next)) {
            let mirrored = self
                .store
                .adjust_cached_stock(company_id, movement.product_id, movement.delta)
                .await?;
            if !mirrored {
                debug!(product_id = %movement.product_id, "Product not mirrored, cached stock unchanged");
            }
        }
        Ok(())
    }
}

/// Overlay unsynced local records on a remote listing.
fn merge_pending(
    remote: Vec<WasteRecord>,
    pending: Vec<WasteRecord>,
    filter: &WasteFilter,
) -> Vec<WasteRecord> {
    let mut by_id: HashMap<WasteRecordId, WasteRecord> =
        remote.into_iter().map(|r| (r.id, r)).collect();

    for local in pending {
        let newer = by_id
            .get(&local.id)
            .is_none_or(|current| local.supersedes(current));
        if !newer {
            continue;
        }
        if filter.matches(&local) {
            by_id.insert(local.id, local);
        } else {
            // The local edit moved the record out of the filter.
            by_id.remove(&local.id);
        }
    }

    by_id.into_values().collect()
}
