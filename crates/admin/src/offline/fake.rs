//! In-memory [`WasteRemote`] used by the offline, catalogue and service tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bakery_core::{CompanyId, SyncStatus, WasteRecordId};

use super::sync::WasteRemote;
use crate::db::{RepositoryError, UpsertOutcome};
use crate::models::product::Product;
use crate::models::waste::{WasteFilter, WasteRecord};

/// Stand-in for the remote store.
#[derive(Default)]
pub(crate) struct FakeRemote {
    pub(crate) waste: Mutex<HashMap<WasteRecordId, WasteRecord>>,
    pub(crate) products: Vec<Product>,
    /// Records the remote refuses to store or delete, with a
    /// non-connectivity error.
    pub(crate) reject: HashSet<WasteRecordId>,
    down: AtomicBool,
    product_calls: AtomicUsize,
}

impl FakeRemote {
    pub(crate) fn with_products(products: Vec<Product>) -> Self {
        Self {
            products,
            ..Self::default()
        }
    }

    pub(crate) fn rejecting(ids: impl IntoIterator<Item = WasteRecordId>) -> Self {
        Self {
            reject: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Make every call fail as if the database were unreachable.
    pub(crate) fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub(crate) fn product_calls(&self) -> usize {
        self.product_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn stored(&self, id: WasteRecordId) -> Option<WasteRecord> {
        self.waste.lock().unwrap().get(&id).cloned()
    }

    pub(crate) fn insert(&self, record: WasteRecord) {
        self.waste
            .lock()
            .unwrap()
            .insert(record.id, record.with_sync_status(SyncStatus::Synced));
    }

    fn check_up(&self) -> Result<(), RepositoryError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

impl WasteRemote for FakeRemote {
    async fn push_waste(&self, record: &WasteRecord) -> Result<UpsertOutcome, RepositoryError> {
        self.check_up()?;
        if self.reject.contains(&record.id) {
            return Err(RepositoryError::NotFound);
        }
        let mut waste = self.waste.lock().unwrap();
        let outcome = match waste.get(&record.id) {
            Some(current) if !record.supersedes(current) => return Ok(UpsertOutcome::Stale),
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        };
        waste.insert(record.id, record.clone().with_sync_status(SyncStatus::Synced));
        Ok(outcome)
    }

    async fn list_waste(
        &self,
        company_id: CompanyId,
        filter: &WasteFilter,
    ) -> Result<Vec<WasteRecord>, RepositoryError> {
        self.check_up()?;
        let mut records: Vec<WasteRecord> = self
            .waste
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.company_id == company_id && filter.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        if let Some(limit) = filter.limit.and_then(|l| usize::try_from(l).ok()) {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn remove_waste(
        &self,
        company_id: CompanyId,
        id: WasteRecordId,
    ) -> Result<bool, RepositoryError> {
        self.check_up()?;
        if self.reject.contains(&id) {
            return Err(RepositoryError::Conflict("waste record is locked".to_string()));
        }
        let mut waste = self.waste.lock().unwrap();
        match waste.get(&id) {
            Some(record) if record.company_id == company_id => Ok(waste.remove(&id).is_some()),
            _ => Ok(false),
        }
    }

    async fn fetch_products(&self, company_id: CompanyId) -> Result<Vec<Product>, RepositoryError> {
        self.product_calls.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;
        Ok(self
            .products
            .iter()
            .filter(|p| p.company_id == company_id)
            .cloned()
            .collect())
    }
}
