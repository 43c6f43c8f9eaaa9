//! Reconciliation between the offline cache and the remote store.
//!
//! A pass pushes the deletions made offline, then every unsynced local waste
//! record, flags the pushed versions as synced, and finally pulls remote
//! waste and products back into the mirror. Conflicts are settled by
//! last-write-wins on `updated_at`, on both sides.

use std::collections::HashSet;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use bakery_core::{CompanyId, SyncStatus, WasteRecordId};

use super::{OfflineError, OfflineStore};
use crate::db::{ProductRepository, RepositoryError, UpsertOutcome, WasteRepository};
use crate::models::product::Product;
use crate::models::waste::{WasteFilter, WasteRecord};

/// Errors that abort a reconciliation pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local cache failed.
    #[error(transparent)]
    Offline(#[from] OfflineError),

    /// The remote store failed while pulling.
    #[error("remote store error: {0}")]
    Remote(#[from] RepositoryError),
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Local deletions applied to the remote store.
    pub deleted: usize,
    /// Local records accepted by the remote store.
    pub pushed: usize,
    /// Remote waste records written into the cache.
    pub pulled_waste: usize,
    /// Products mirrored from the remote catalogue.
    pub pulled_products: usize,
    /// Local records and deletions that could not be pushed and stay pending.
    pub failed: usize,
}

/// The remote side of a reconciliation.
pub trait WasteRemote {
    /// Store a waste record remotely, last-write-wins.
    fn push_waste(
        &self,
        record: &WasteRecord,
    ) -> impl Future<Output = Result<UpsertOutcome, RepositoryError>> + Send;

    /// Remote waste records of a company matching `filter`, most recent first.
    fn list_waste(
        &self,
        company_id: CompanyId,
        filter: &WasteFilter,
    ) -> impl Future<Output = Result<Vec<WasteRecord>, RepositoryError>> + Send;

    /// Delete a remote waste record. Resolves to `false` when it didn't exist.
    fn remove_waste(
        &self,
        company_id: CompanyId,
        id: WasteRecordId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// The remote product catalogue of a company.
    fn fetch_products(
        &self,
        company_id: CompanyId,
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;
}

/// [`WasteRemote`] backed by the `PostgreSQL` repositories.
#[derive(Clone)]
pub struct PgWasteRemote {
    pool: PgPool,
}

impl PgWasteRemote {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl WasteRemote for PgWasteRemote {
    async fn push_waste(&self, record: &WasteRecord) -> Result<UpsertOutcome, RepositoryError> {
        WasteRepository::new(&self.pool).upsert(record).await
    }

    async fn list_waste(
        &self,
        company_id: CompanyId,
        filter: &WasteFilter,
    ) -> Result<Vec<WasteRecord>, RepositoryError> {
        WasteRepository::new(&self.pool).list(company_id, filter).await
    }

    async fn remove_waste(
        &self,
        company_id: CompanyId,
        id: WasteRecordId,
    ) -> Result<bool, RepositoryError> {
        WasteRepository::new(&self.pool).delete(company_id, id).await
    }

    async fn fetch_products(&self, company_id: CompanyId) -> Result<Vec<Product>, RepositoryError> {
        ProductRepository::new(&self.pool).list(company_id).await
    }
}

/// Runs push-then-pull passes for one offline store.
pub struct Reconciler<'a, R> {
    store: &'a OfflineStore,
    remote: &'a R,
}

impl<'a, R: WasteRemote + Sync> Reconciler<'a, R> {
    /// Create a reconciler over a store and a remote.
    #[must_use]
    pub const fn new(store: &'a OfflineStore, remote: &'a R) -> Self {
        Self { store, remote }
    }

    /// Reconcile one company.
    ///
    /// A record or deletion the remote rejects stays pending and is counted
    /// in [`SyncReport::failed`]. When the remote becomes unreachable the
    /// remaining pushes are skipped and the pass stops before pulling.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Offline` if the local cache fails and
    /// `SyncError::Remote` if the remote is unreachable or the pull fails.
    /// Work accepted before the failure is recorded either way.
    #[tracing::instrument(skip(self), fields(company_id = %company_id))]
    pub async fn run(&self, company_id: CompanyId) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();

        let mut unreachable = self.push_deletions(company_id, &mut report).await?;

        let pending = self.store.unsynced_waste(company_id).await?;
        if unreachable.is_some() {
            report.failed += pending.len();
        } else {
            unreachable = self.push_records(company_id, &pending, &mut report).await?;
        }

        if let Some(e) = unreachable {
            tracing::warn!(
                deleted = report.deleted,
                pushed = report.pushed,
                failed = report.failed,
                error = %e,
                "Remote store unreachable, reconciliation stopped"
            );
            return Err(SyncError::Remote(e));
        }

        report.pulled_waste = self.pull_waste(company_id).await?;
        report.pulled_products = self.pull_products(company_id).await?;

        tracing::info!(
            deleted = report.deleted,
            pushed = report.pushed,
            pulled_waste = report.pulled_waste,
            pulled_products = report.pulled_products,
            failed = report.failed,
            "Reconciliation finished"
        );

        Ok(report)
    }

    /// Apply offline deletions remotely. Resolves to the connectivity error
    /// that stopped the loop, if any.
    async fn push_deletions(
        &self,
        company_id: CompanyId,
        report: &mut SyncReport,
    ) -> Result<Option<RepositoryError>, SyncError> {
        let deletions = self.store.pending_deletions(company_id).await?;

        for (idx, id) in deletions.iter().enumerate() {
            match self.remote.remove_waste(company_id, *id).await {
                Ok(found) => {
                    tracing::debug!(waste_id = %id, found, "Waste deletion pushed");
                    self.store.clear_deletion(company_id, *id).await?;
                    report.deleted += 1;
                }
                Err(e) if e.is_unavailable() => {
                    report.failed += deletions.len() - idx;
                    return Ok(Some(e));
                }
                Err(e) => {
                    tracing::warn!(waste_id = %id, error = %e, "Remote rejected waste deletion");
                    report.failed += 1;
                }
            }
        }

        Ok(None)
    }

    /// Push unsynced records and flag the accepted versions as synced.
    /// Resolves to the connectivity error that stopped the loop, if any.
    async fn push_records(
        &self,
        company_id: CompanyId,
        pending: &[WasteRecord],
        report: &mut SyncReport,
    ) -> Result<Option<RepositoryError>, SyncError> {
        let mut accepted: Vec<(WasteRecordId, DateTime<Utc>)> = Vec::with_capacity(pending.len());
        let mut unreachable = None;

        for (idx, record) in pending.iter().enumerate() {
            match self.remote.push_waste(record).await {
                Ok(outcome) => {
                    // A stale push means the remote already holds a newer
                    // version; the pull brings it back.
                    tracing::debug!(waste_id = %record.id, ?outcome, "Waste record pushed");
                    accepted.push((record.id, record.updated_at));
                }
                Err(e) if e.is_unavailable() => {
                    report.failed += pending.len() - idx;
                    unreachable = Some(e);
                    break;
                }
                Err(e) => {
                    tracing::warn!(waste_id = %record.id, error = %e, "Remote rejected waste record");
                    report.failed += 1;
                }
            }
        }

        // Only the pushed versions; a record edited meanwhile stays unsynced.
        self.store.mark_synced(company_id, &accepted).await?;
        report.pushed = accepted.len();

        Ok(unreachable)
    }

    async fn pull_waste(&self, company_id: CompanyId) -> Result<usize, SyncError> {
        let remote = self
            .remote
            .list_waste(company_id, &WasteFilter::default())
            .await?;
        let remote_ids: HashSet<WasteRecordId> = remote.iter().map(|r| r.id).collect();
        let deleted: HashSet<WasteRecordId> = self
            .store
            .pending_deletions(company_id)
            .await?
            .into_iter()
            .collect();

        let mut written = 0;
        for record in remote {
            // Deleted here; the deletion is retried on the next pass.
            if deleted.contains(&record.id) {
                continue;
            }
            if self
                .store
                .put_waste(&record.with_sync_status(SyncStatus::Synced))
                .await?
            {
                written += 1;
            }
        }

        // Synced records missing remotely were deleted there.
        for local in self.store.waste_records(company_id).await? {
            if local.sync_status.is_synced() && !remote_ids.contains(&local.id) {
                self.store.delete_waste(company_id, local.id).await?;
            }
        }

        Ok(written)
    }

    async fn pull_products(&self, company_id: CompanyId) -> Result<usize, SyncError> {
        let products = self.remote.fetch_products(company_id).await?;
        Ok(self.store.replace_products(company_id, &products).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Mutex;

    use chrono::Duration;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::offline::fake::FakeRemote;
    use crate::offline::tests::{product, waste};

    #[tokio::test]
    async fn test_pushes_everything_when_remote_accepts() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let company = CompanyId::new(1);
        let a = waste(1, 1, dec!(2));
        let b = waste(1, 2, dec!(1));
        store.put_waste(&a).await.unwrap();
        store.put_waste(&b).await.unwrap();

        let remote = FakeRemote::with_products(vec![product(1, 1, "Baguette", dec!(40))]);
        let report = Reconciler::new(&store, &remote).run(company).await.unwrap();

        assert_eq!(report.pushed, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(report.pulled_products, 1);
        assert!(store.unsynced_waste(company).await.unwrap().is_empty());
        assert!(remote.stored(a.id).is_some());
        assert_eq!(store.products(company).await.unwrap()[0].stock_quantity, dec!(40));
    }

    #[tokio::test]
    async fn test_rejected_push_stays_unsynced() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let company = CompanyId::new(1);
        let good = waste(1, 1, dec!(2));
        let bad = waste(1, 99, dec!(1));
        store.put_waste(&good).await.unwrap();
        store.put_waste(&bad).await.unwrap();

        let remote = FakeRemote::rejecting([bad.id]);
        let report = Reconciler::new(&store, &remote).run(company).await.unwrap();

        assert_eq!(report.pushed, 1);
        assert_eq!(report.failed, 1);
        let unsynced = store.unsynced_waste(company).await.unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].id, bad.id);

        // The next pass retries it.
        let remote = FakeRemote::default();
        let report = Reconciler::new(&store, &remote).run(company).await.unwrap();
        assert_eq!(report.pushed, 1);
        assert!(store.unsynced_waste(company).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_remote_keeps_records_unsynced() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let company = CompanyId::new(1);
        store.put_waste(&waste(1, 1, dec!(2))).await.unwrap();
        store.put_waste(&waste(1, 2, dec!(2))).await.unwrap();

        let remote = FakeRemote::default();
        remote.set_down(true);
        let result = Reconciler::new(&store, &remote).run(company).await;

        assert!(matches!(result, Err(SyncError::Remote(ref e)) if e.is_unavailable()));
        assert_eq!(store.unsynced_waste(company).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_newer_remote_version_wins() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let company = CompanyId::new(1);
        let local = waste(1, 1, dec!(2));
        store.put_waste(&local).await.unwrap();

        let mut remote_version = local.clone();
        remote_version.quantity = dec!(7);
        remote_version.updated_at = local.updated_at + Duration::hours(1);

        let remote = FakeRemote::default();
        remote.insert(remote_version);

        let report = Reconciler::new(&store, &remote).run(company).await.unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(remote.stored(local.id).unwrap().quantity, dec!(7));

        let cached = store.waste_record(company, local.id).await.unwrap().unwrap();
        assert_eq!(cached.quantity, dec!(7));
        assert!(cached.sync_status.is_synced());
    }

    #[tokio::test]
    async fn test_pull_removes_records_deleted_remotely() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let company = CompanyId::new(1);
        let gone = waste(1, 1, dec!(1)).with_sync_status(SyncStatus::Synced);
        store.put_waste(&gone).await.unwrap();

        let remote = FakeRemote::default();
        Reconciler::new(&store, &remote).run(company).await.unwrap();

        assert!(store.waste_record(company, gone.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_other_companies_are_left_alone() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let other = waste(2, 1, dec!(1));
        store.put_waste(&other).await.unwrap();

        let remote = FakeRemote::default();
        let report = Reconciler::new(&store, &remote)
            .run(CompanyId::new(1))
            .await
            .unwrap();

        assert_eq!(report.pushed, 0);
        assert_eq!(store.unsynced_waste(CompanyId::new(2)).await.unwrap().len(), 1);
        assert!(remote.stored(other.id).is_none());
    }

    /// Remote that stores a newer local edit while a push is in flight.
    struct EditingRemote {
        inner: FakeRemote,
        store: OfflineStore,
        edit: Mutex<Option<WasteRecord>>,
    }

    impl WasteRemote for EditingRemote {
        async fn push_waste(&self, record: &WasteRecord) -> Result<UpsertOutcome, RepositoryError> {
            let outcome = self.inner.push_waste(record).await?;
            let edit = self.edit.lock().unwrap().take();
            if let Some(edit) = edit {
                self.store.put_waste(&edit).await.unwrap();
            }
            Ok(outcome)
        }

        async fn list_waste(
            &self,
            company_id: CompanyId,
            filter: &WasteFilter,
        ) -> Result<Vec<WasteRecord>, RepositoryError> {
            self.inner.list_waste(company_id, filter).await
        }

        async fn remove_waste(
            &self,
            company_id: CompanyId,
            id: WasteRecordId,
        ) -> Result<bool, RepositoryError> {
            self.inner.remove_waste(company_id, id).await
        }

        async fn fetch_products(&self, company_id: CompanyId) -> Result<Vec<Product>, RepositoryError> {
            self.inner.fetch_products(company_id).await
        }
    }

    #[tokio::test]
    async fn test_edit_during_push_stays_unsynced() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let company = CompanyId::new(1);
        let original = waste(1, 1, dec!(2));
        store.put_waste(&original).await.unwrap();

        let mut edit = original.clone();
        edit.quantity = dec!(9);
        edit.updated_at = original.updated_at + Duration::seconds(30);

        let remote = EditingRemote {
            inner: FakeRemote::default(),
            store: store.clone(),
            edit: Mutex::new(Some(edit)),
        };

        let report = Reconciler::new(&store, &remote).run(company).await.unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(remote.inner.stored(original.id).unwrap().quantity, dec!(2));

        let cached = store.waste_record(company, original.id).await.unwrap().unwrap();
        assert_eq!(cached.quantity, dec!(9));
        assert_eq!(cached.sync_status, SyncStatus::Unsynced);

        // The next pass pushes the edit.
        let report = Reconciler::new(&store, &remote).run(company).await.unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(remote.inner.stored(original.id).unwrap().quantity, dec!(9));
        assert!(store.unsynced_waste(company).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_deletion_is_pushed() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let company = CompanyId::new(1);
        let record = waste(1, 1, dec!(3));

        let remote = FakeRemote::default();
        remote.insert(record.clone());
        store.mark_deleted(company, record.id, record.updated_at).await.unwrap();

        let report = Reconciler::new(&store, &remote).run(company).await.unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.pulled_waste, 0);
        assert!(remote.stored(record.id).is_none());
        assert!(store.pending_deletions(company).await.unwrap().is_empty());
        assert!(store.waste_record(company, record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejected_deletion_is_not_pulled_back() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let company = CompanyId::new(1);
        let record = waste(1, 1, dec!(3));

        let remote = FakeRemote::rejecting([record.id]);
        remote.insert(record.clone());
        store.mark_deleted(company, record.id, record.updated_at).await.unwrap();

        let report = Reconciler::new(&store, &remote).run(company).await.unwrap();
        assert_eq!(report.deleted, 0);
        assert_eq!(report.failed, 1);
        assert!(remote.stored(record.id).is_some());
        assert!(store.waste_record(company, record.id).await.unwrap().is_none());
        assert_eq!(store.pending_deletions(company).await.unwrap(), vec![record.id]);
    }

    #[tokio::test]
    async fn test_unreachable_remote_keeps_deletions_pending() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let company = CompanyId::new(1);
        let id = WasteRecordId::generate();
        store.mark_deleted(company, id, chrono::Utc::now()).await.unwrap();
        store.put_waste(&waste(1, 2, dec!(1))).await.unwrap();

        let remote = FakeRemote::default();
        remote.set_down(true);
        let result = Reconciler::new(&store, &remote).run(company).await;

        assert!(matches!(result, Err(SyncError::Remote(ref e)) if e.is_unavailable()));
        assert_eq!(store.pending_deletions(company).await.unwrap(), vec![id]);
        assert_eq!(store.unsynced_waste(company).await.unwrap().len(), 1);
    }
}
