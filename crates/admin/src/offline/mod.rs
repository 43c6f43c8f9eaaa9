//! Offline cache for products and waste records.
//!
//! A local `SQLite` file mirrors the remote catalogue and holds waste entries
//! made while the remote store is unreachable. Rows are partitioned by
//! company and stored as JSON payloads; timestamps are kept as fixed-width
//! RFC 3339 strings so that `SQLite` can compare them as text.
//!
//! Waste rows carry a `synced` flag. A row written locally starts unsynced
//! and is flagged synced once [`sync::Reconciler`] has pushed it. Deletions
//! that could not reach the remote store leave a marker that the next pass
//! pushes.

#[cfg(test)]
pub(crate) mod fake;
pub mod sync;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

use bakery_core::{CompanyId, ProductId, SyncStatus, WasteRecordId};

use crate::models::product::Product;
use crate::models::waste::WasteRecord;

/// Errors raised by the offline cache.
#[derive(Debug, Error)]
pub enum OfflineError {
    /// `SQLite` error from sqlx.
    #[error("offline store error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("offline store migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A cached payload could not be encoded or decoded.
    #[error("offline payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// A cached row holds an ID that is not a UUID.
    #[error("offline row has an invalid waste record ID: {0}")]
    InvalidId(#[from] uuid::Error),
}

/// Format a timestamp so that lexicographic order matches time order.
fn stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Debug, sqlx::FromRow)]
struct CachedWasteRow {
    payload: String,
    synced: bool,
}

impl TryFrom<CachedWasteRow> for WasteRecord {
    type Error = OfflineError;

    fn try_from(row: CachedWasteRow) -> Result<Self, Self::Error> {
        let record: Self = serde_json::from_str(&row.payload)?;
        Ok(record.with_sync_status(SyncStatus::from(row.synced)))
    }
}

/// Local store mirroring remote products and waste, keyed by company.
#[derive(Clone)]
pub struct OfflineStore {
    pool: SqlitePool,
}

impl OfflineStore {
    /// Open (creating if needed) the cache file at `path` and migrate it.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError` if the file cannot be opened or migrated.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, OfflineError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        tracing::info!(path = %path.as_ref().display(), "Offline store opened");
        Self::migrate(pool).await
    }

    /// Open a throwaway in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError` if the store cannot be created.
    pub async fn open_in_memory() -> Result<Self, OfflineError> {
        // A single connection that never expires, or the in-memory database vanishes.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, OfflineError> {
        sqlx::migrate!("./migrations/offline").run(&pool).await?;
        Ok(Self { pool })
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Replace the mirrored catalogue of a company.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError` if the write fails; the previous mirror is kept.
    pub async fn replace_products(
        &self,
        company_id: CompanyId,
        products: &[Product],
    ) -> Result<usize, OfflineError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cached_products WHERE company_id = ?")
            .bind(company_id.as_i32())
            .execute(&mut *tx)
            .await?;

        for product in products {
            sqlx::query(
                r"
                INSERT INTO cached_products (company_id, product_id, payload, updated_at)
                VALUES (?, ?, ?, ?)
                ",
            )
            .bind(company_id.as_i32())
            .bind(product.id.as_i32())
            .bind(serde_json::to_string(product)?)
            .bind(stamp(product.updated_at))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            company_id = %company_id,
            products = products.len(),
            "Offline product mirror replaced"
        );

        Ok(products.len())
    }

    /// Mirrored products of a company, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError` if the read fails or a payload is corrupt.
    pub async fn products(&self, company_id: CompanyId) -> Result<Vec<Product>, OfflineError> {
        let payloads: Vec<String> =
            sqlx::query_scalar("SELECT payload FROM cached_products WHERE company_id = ?")
                .bind(company_id.as_i32())
                .fetch_all(&self.pool)
                .await?;

        let mut products = payloads
            .iter()
            .map(|p| serde_json::from_str::<Product>(p))
            .collect::<Result<Vec<_>, _>>()?;
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.as_i32().cmp(&b.id.as_i32())));
        Ok(products)
    }

    /// One mirrored product.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError` if the read fails or the payload is corrupt.
    pub async fn product(
        &self,
        company_id: CompanyId,
        product_id: ProductId,
    ) -> Result<Option<Product>, OfflineError> {
        let payload: Option<String> = sqlx::query_scalar(
            "SELECT payload FROM cached_products WHERE company_id = ? AND product_id = ?",
        )
        .bind(company_id.as_i32())
        .bind(product_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        Ok(payload.map(|p| serde_json::from_str(&p)).transpose()?)
    }

    /// Add `delta` to a mirrored product's stock.
    ///
    /// Returns `false` when the product is not mirrored.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError` if the update fails.
    pub async fn adjust_cached_stock(
        &self,
        company_id: CompanyId,
        product_id: ProductId,
        delta: Decimal,
    ) -> Result<bool, OfflineError> {
        let mut tx = self.pool.begin().await?;

        let payload: Option<String> = sqlx::query_scalar(
            "SELECT payload FROM cached_products WHERE company_id = ? AND product_id = ?",
        )
        .bind(company_id.as_i32())
        .bind(product_id.as_i32())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(payload) = payload else {
            return Ok(false);
        };

        let mut product: Product = serde_json::from_str(&payload)?;
        product.stock_quantity += delta;

        sqlx::query(
            "UPDATE cached_products SET payload = ? WHERE company_id = ? AND product_id = ?",
        )
        .bind(serde_json::to_string(&product)?)
        .bind(company_id.as_i32())
        .bind(product_id.as_i32())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    // =========================================================================
    // Waste
    // =========================================================================

    /// Insert or replace a waste record, last-write-wins on `updated_at`.
    ///
    /// The record's own `sync_status` is stored. Returns `false` when a newer
    /// version is already cached and nothing was written.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError` if the write fails.
    pub async fn put_waste(&self, record: &WasteRecord) -> Result<bool, OfflineError> {
        let result = sqlx::query(
            r"
            INSERT INTO cached_waste_records
                (company_id, id, payload, synced, recorded_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (company_id, id) DO UPDATE SET
                payload = excluded.payload,
                synced = excluded.synced,
                recorded_at = excluded.recorded_at,
                updated_at = excluded.updated_at
            WHERE excluded.updated_at >= cached_waste_records.updated_at
            ",
        )
        .bind(record.company_id.as_i32())
        .bind(record.id.to_string())
        .bind(serde_json::to_string(record)?)
        .bind(record.sync_status.is_synced())
        .bind(stamp(record.recorded_at))
        .bind(stamp(record.updated_at))
        .execute(&self.pool)
        .await?;

        let applied = result.rows_affected() > 0;
        if !applied {
            tracing::debug!(waste_id = %record.id, "Cached waste record is newer, write skipped");
        }
        Ok(applied)
    }

    /// One cached waste record.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError` if the read fails or the payload is corrupt.
    pub async fn waste_record(
        &self,
        company_id: CompanyId,
        id: WasteRecordId,
    ) -> Result<Option<WasteRecord>, OfflineError> {
        let row = sqlx::query_as::<_, CachedWasteRow>(
            "SELECT payload, synced FROM cached_waste_records WHERE company_id = ? AND id = ?",
        )
        .bind(company_id.as_i32())
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Every cached waste record of a company, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError` if the read fails or a payload is corrupt.
    pub async fn waste_records(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<WasteRecord>, OfflineError> {
        let rows = sqlx::query_as::<_, CachedWasteRow>(
            r"
            SELECT payload, synced FROM cached_waste_records
            WHERE company_id = ?
            ORDER BY recorded_at DESC, id
            ",
        )
        .bind(company_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Cached waste records not yet pushed, oldest change first.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError` if the read fails or a payload is corrupt.
    pub async fn unsynced_waste(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<WasteRecord>, OfflineError> {
        let rows = sqlx::query_as::<_, CachedWasteRow>(
            r"
            SELECT payload, synced FROM cached_waste_records
            WHERE company_id = ? AND synced = 0
            ORDER BY updated_at, id
            ",
        )
        .bind(company_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Flag pushed versions as synced. Returns how many rows changed.
    ///
    /// Each entry names a record and the `updated_at` of the version that was
    /// pushed. A row edited since then keeps its unsynced flag.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError` if the update fails.
    pub async fn mark_synced(
        &self,
        company_id: CompanyId,
        versions: &[(WasteRecordId, DateTime<Utc>)],
    ) -> Result<u64, OfflineError> {
        let mut tx = self.pool.begin().await?;
        let mut changed = 0;

        for (id, updated_at) in versions {
            changed += sqlx::query(
                r"
                UPDATE cached_waste_records SET synced = 1
                WHERE company_id = ? AND id = ? AND updated_at = ? AND synced = 0
                ",
            )
            .bind(company_id.as_i32())
            .bind(id.to_string())
            .bind(stamp(*updated_at))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(changed)
    }

    /// Remove a cached waste record. Returns `false` when it was not cached.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError` if the delete fails.
    pub async fn delete_waste(
        &self,
        company_id: CompanyId,
        id: WasteRecordId,
    ) -> Result<bool, OfflineError> {
        let result =
            sqlx::query("DELETE FROM cached_waste_records WHERE company_id = ? AND id = ?")
                .bind(company_id.as_i32())
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remember that a waste record was deleted locally but not remotely.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError` if the write fails.
    pub async fn mark_deleted(
        &self,
        company_id: CompanyId,
        id: WasteRecordId,
        at: DateTime<Utc>,
    ) -> Result<(), OfflineError> {
        sqlx::query(
            r"
            INSERT INTO cached_waste_deletions (company_id, id, deleted_at)
            VALUES (?, ?, ?)
            ON CONFLICT (company_id, id) DO NOTHING
            ",
        )
        .bind(company_id.as_i32())
        .bind(id.to_string())
        .bind(stamp(at))
        .execute(&self.pool)
        .await?;

        tracing::debug!(waste_id = %id, "Waste deletion kept for the next sync");
        Ok(())
    }

    /// Deletions not yet pushed, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError` if the read fails or an ID is corrupt.
    pub async fn pending_deletions(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<WasteRecordId>, OfflineError> {
        let ids: Vec<String> = sqlx::query_scalar(
            r"
            SELECT id FROM cached_waste_deletions
            WHERE company_id = ?
            ORDER BY deleted_at, id
            ",
        )
        .bind(company_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        ids.iter()
            .map(|id| id.parse().map_err(OfflineError::from))
            .collect()
    }

    /// Forget a deletion once the remote store has applied it.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError` if the delete fails.
    pub async fn clear_deletion(
        &self,
        company_id: CompanyId,
        id: WasteRecordId,
    ) -> Result<bool, OfflineError> {
        let result =
            sqlx::query("DELETE FROM cached_waste_deletions WHERE company_id = ? AND id = ?")
                .bind(company_id.as_i32())
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Check the store answers queries.
    ///
    /// # Errors
    ///
    /// Returns `OfflineError` if the store is unusable.
    pub async fn ping(&self) -> Result<(), OfflineError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
pub(crate) mod tests {
    use super::*;
    use bakery_core::{ItemCode, WasteReason};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    use crate::models::waste::CreateWasteInput;

    pub(crate) fn product(company: i32, id: i32, name: &str, stock: Decimal) -> Product {
        let at = Utc.with_ymd_and_hms(2026, 1, 10, 5, 0, 0).unwrap();
        Product {
            id: ProductId::new(id),
            company_id: CompanyId::new(company),
            code: ItemCode::parse(&format!("P{id}")).unwrap(),
            name: name.to_string(),
            unit_price: dec!(1.20),
            weight_per_unit: dec!(0.25),
            stock_quantity: stock,
            created_at: at,
            updated_at: at,
        }
    }

    pub(crate) fn waste(company: i32, product: i32, quantity: Decimal) -> WasteRecord {
        let input = CreateWasteInput {
            id: None,
            product_id: ProductId::new(product),
            quantity,
            reason: WasteReason::Expired,
            recorded_at: None,
        };
        let at = Utc.with_ymd_and_hms(2026, 1, 10, 18, 0, 0).unwrap();
        WasteRecord::new(CompanyId::new(company), "lucie", &input, at).unwrap()
    }

    #[tokio::test]
    async fn test_products_are_partitioned_by_company() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        store
            .replace_products(
                CompanyId::new(1),
                &[product(1, 1, "Croissant", dec!(5)), product(1, 2, "Baguette", dec!(9))],
            )
            .await
            .unwrap();
        store
            .replace_products(CompanyId::new(2), &[product(2, 3, "Brioche", dec!(1))])
            .await
            .unwrap();

        let first = store.products(CompanyId::new(1)).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].name, "Baguette");
        assert_eq!(store.products(CompanyId::new(2)).await.unwrap().len(), 1);
        assert!(store
            .product(CompanyId::new(2), ProductId::new(1))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_replace_products_drops_missing_ones() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let company = CompanyId::new(1);
        store
            .replace_products(company, &[product(1, 1, "A", dec!(0)), product(1, 2, "B", dec!(0))])
            .await
            .unwrap();
        store
            .replace_products(company, &[product(1, 2, "B", dec!(0))])
            .await
            .unwrap();

        let products = store.products(company).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, ProductId::new(2));
    }

    #[tokio::test]
    async fn test_adjust_cached_stock() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let company = CompanyId::new(1);
        store
            .replace_products(company, &[product(1, 1, "Baguette", dec!(10))])
            .await
            .unwrap();

        assert!(store
            .adjust_cached_stock(company, ProductId::new(1), dec!(-3))
            .await
            .unwrap());
        assert!(!store
            .adjust_cached_stock(company, ProductId::new(9), dec!(-3))
            .await
            .unwrap());

        let cached = store.product(company, ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(cached.stock_quantity, dec!(7));
    }

    #[tokio::test]
    async fn test_put_waste_is_last_write_wins() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let company = CompanyId::new(1);

        let original = waste(1, 1, dec!(2));
        let mut newer = original.clone();
        newer.quantity = dec!(5);
        newer.updated_at = original.updated_at + Duration::minutes(10);

        assert!(store.put_waste(&newer).await.unwrap());
        assert!(!store.put_waste(&original).await.unwrap());

        let cached = store.waste_record(company, original.id).await.unwrap().unwrap();
        assert_eq!(cached.quantity, dec!(5));
    }

    #[tokio::test]
    async fn test_put_waste_same_version_applies() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let record = waste(1, 1, dec!(2));

        assert!(store.put_waste(&record).await.unwrap());
        let synced = record.clone().with_sync_status(SyncStatus::Synced);
        assert!(store.put_waste(&synced).await.unwrap());

        let cached = store
            .waste_record(record.company_id, record.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_unsynced_and_mark_synced() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let company = CompanyId::new(1);
        let a = waste(1, 1, dec!(1));
        let b = waste(1, 2, dec!(3));
        let other_company = waste(2, 1, dec!(1));

        for record in [&a, &b, &other_company] {
            store.put_waste(record).await.unwrap();
        }

        assert_eq!(store.unsynced_waste(company).await.unwrap().len(), 2);
        assert_eq!(
            store.mark_synced(company, &[(a.id, a.updated_at)]).await.unwrap(),
            1
        );

        let unsynced = store.unsynced_waste(company).await.unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].id, b.id);

        // Marking again is a no-op, and other companies are untouched.
        assert_eq!(
            store.mark_synced(company, &[(a.id, a.updated_at)]).await.unwrap(),
            0
        );
        assert_eq!(
            store.unsynced_waste(CompanyId::new(2)).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_mark_synced_skips_records_edited_since_the_push() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let company = CompanyId::new(1);
        let pushed = waste(1, 1, dec!(2));
        store.put_waste(&pushed).await.unwrap();

        let mut edited = pushed.clone();
        edited.quantity = dec!(9);
        edited.updated_at = pushed.updated_at + Duration::seconds(1);
        store.put_waste(&edited).await.unwrap();

        assert_eq!(
            store
                .mark_synced(company, &[(pushed.id, pushed.updated_at)])
                .await
                .unwrap(),
            0
        );
        let cached = store.waste_record(company, pushed.id).await.unwrap().unwrap();
        assert_eq!(cached.quantity, dec!(9));
        assert_eq!(cached.sync_status, SyncStatus::Unsynced);
    }

    #[tokio::test]
    async fn test_deletion_markers() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let company = CompanyId::new(1);
        let first = WasteRecordId::generate();
        let second = WasteRecordId::generate();
        let at = Utc.with_ymd_and_hms(2026, 1, 11, 8, 0, 0).unwrap();

        store.mark_deleted(company, second, at + Duration::minutes(1)).await.unwrap();
        store.mark_deleted(company, first, at).await.unwrap();
        // Marking twice keeps one marker.
        store.mark_deleted(company, first, at).await.unwrap();
        store.mark_deleted(CompanyId::new(2), first, at).await.unwrap();

        assert_eq!(store.pending_deletions(company).await.unwrap(), vec![first, second]);

        assert!(store.clear_deletion(company, first).await.unwrap());
        assert!(!store.clear_deletion(company, first).await.unwrap());
        assert_eq!(store.pending_deletions(company).await.unwrap(), vec![second]);
        assert_eq!(store.pending_deletions(CompanyId::new(2)).await.unwrap(), vec![first]);
    }

    #[tokio::test]
    async fn test_delete_waste() {
        let store = OfflineStore::open_in_memory().await.unwrap();
        let record = waste(1, 1, dec!(1));
        store.put_waste(&record).await.unwrap();

        assert!(store.delete_waste(record.company_id, record.id).await.unwrap());
        assert!(!store.delete_waste(record.company_id, record.id).await.unwrap());
        assert!(store.waste_records(record.company_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_file_store() {
        let dir = std::env::temp_dir().join(format!("bakery-offline-{}", WasteRecordId::generate()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cache.db");

        {
            let store = OfflineStore::open(&path).await.unwrap();
            store.put_waste(&waste(1, 1, dec!(1))).await.unwrap();
        }
        let reopened = OfflineStore::open(&path).await.unwrap();
        assert_eq!(reopened.waste_records(CompanyId::new(1)).await.unwrap().len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
