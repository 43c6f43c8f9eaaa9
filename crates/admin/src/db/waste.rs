//! Database operations for waste records.
//!
//! Writes are last-write-wins on `updated_at` and keep product stock in step
//! with the recorded quantities.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use bakery_core::{CompanyId, ProductId, SyncStatus, WasteReason, WasteRecordId};

use super::RepositoryError;
use super::products::adjust_stock_in;
use crate::models::waste::{WasteFilter, WasteRecord, stock_movements};

const WASTE_COLUMNS: &str =
    "id, company_id, product_id, quantity, reason, recorded_at, operator, updated_at";

/// What an upsert did with the incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The record was new.
    Inserted,
    /// The record replaced an older version.
    Updated,
    /// The stored version is newer; nothing changed.
    Stale,
}

impl UpsertOutcome {
    /// `true` unless the incoming record lost to a newer stored version.
    #[must_use]
    pub const fn applied(self) -> bool {
        !matches!(self, Self::Stale)
    }
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct WasteRow {
    id: Uuid,
    company_id: i32,
    product_id: i32,
    quantity: Decimal,
    reason: String,
    recorded_at: DateTime<Utc>,
    operator: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WasteRow> for WasteRecord {
    type Error = RepositoryError;

    fn try_from(row: WasteRow) -> Result<Self, Self::Error> {
        let reason: WasteReason = row.reason.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("waste record {}: {e}", row.id))
        })?;

        Ok(Self {
            id: WasteRecordId::from_uuid(row.id),
            company_id: CompanyId::new(row.company_id),
            product_id: ProductId::new(row.product_id),
            quantity: row.quantity,
            reason,
            recorded_at: row.recorded_at,
            operator: row.operator,
            updated_at: row.updated_at,
            // Anything read from the remote store is by definition synced.
            sync_status: SyncStatus::Synced,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for waste record database operations.
pub struct WasteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WasteRepository<'a> {
    /// Create a new waste repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace a waste record, last-write-wins on `updated_at`.
    ///
    /// Product stock is adjusted by the difference between the stored and
    /// the incoming quantity in the same transaction.
    ///
    /// The insert is attempted first: two concurrent pushes of a new record
    /// cannot both see it missing, so its quantity leaves stock once.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the ID belongs to another company.
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn upsert(&self, record: &WasteRecord) -> Result<UpsertOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted: Option<Uuid> = sqlx::query_scalar(
            r"
            INSERT INTO bakery.waste_records
                (id, company_id, product_id, quantity, reason, recorded_at, operator, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            RETURNING id
            ",
        )
        .bind(record.id.as_uuid())
        .bind(record.company_id.as_i32())
        .bind(record.product_id.as_i32())
        .bind(record.quantity)
        .bind(record.reason.as_str())
        .bind(record.recorded_at)
        .bind(&record.operator)
        .bind(record.updated_at)
        .fetch_optional(&mut *tx)
        .await?;

        let (previous, outcome) = if inserted.is_some() {
            (None, UpsertOutcome::Inserted)
        } else {
            let current = lock_existing(&mut *tx, record.id).await?;
            if current.company_id != record.company_id {
                return Err(RepositoryError::Conflict(
                    "waste record ID already used by another company".to_string(),
                ));
            }
            if !record.supersedes(&current) {
                tracing::debug!(
                    waste_id = %record.id,
                    stored = %current.updated_at,
                    incoming = %record.updated_at,
                    "Ignoring stale waste record"
                );
                return Ok(UpsertOutcome::Stale);
            }

            sqlx::query(
                r"
                UPDATE bakery.waste_records SET
                    product_id = $2,
                    quantity = $3,
                    reason = $4,
                    recorded_at = $5,
                    operator = $6,
                    updated_at = $7
                WHERE id = $1
                ",
            )
            .bind(record.id.as_uuid())
            .bind(record.product_id.as_i32())
            .bind(record.quantity)
            .bind(record.reason.as_str())
            .bind(record.recorded_at)
            .bind(&record.operator)
            .bind(record.updated_at)
            .execute(&mut *tx)
            .await?;

            (Some(current), UpsertOutcome::Updated)
        };

        let movements = stock_movements(previous.as_ref(), Some(record));
        adjust_stock_in(&mut *tx, record.company_id, &movements).await?;

        tx.commit().await?;

        tracing::info!(
            waste_id = %record.id,
            company_id = %record.company_id,
            product_id = %record.product_id,
            quantity = %record.quantity,
            reason = %record.reason,
            outcome = ?outcome,
            "Waste record stored"
        );

        Ok(outcome)
    }

    /// Get a waste record by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        company_id: CompanyId,
        id: WasteRecordId,
    ) -> Result<Option<WasteRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, WasteRow>(&format!(
            r"
            SELECT {WASTE_COLUMNS}
            FROM bakery.waste_records
            WHERE company_id = $1 AND id = $2
            "
        ))
        .bind(company_id.as_i32())
        .bind(id.as_uuid())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// List waste records, most recent first.
    ///
    /// Without a `limit` every matching record is returned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        company_id: CompanyId,
        filter: &WasteFilter,
    ) -> Result<Vec<WasteRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, WasteRow>(&format!(
            r"
            SELECT {WASTE_COLUMNS}
            FROM bakery.waste_records
            WHERE company_id = $1
                AND ($2::date IS NULL OR recorded_at >= $2::date)
                AND ($3::date IS NULL OR recorded_at < $3::date + 1)
                AND ($4::text IS NULL OR reason = $4)
            ORDER BY recorded_at DESC, id
            LIMIT $5
            "
        ))
        .bind(company_id.as_i32())
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.reason.map(WasteReason::as_str))
        .bind(filter.limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Delete a waste record and give its quantity back to stock.
    ///
    /// # Returns
    ///
    /// Returns `true` if the record was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(
        &self,
        company_id: CompanyId,
        id: WasteRecordId,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query_as::<_, WasteRow>(&format!(
            r"
            DELETE FROM bakery.waste_records
            WHERE company_id = $1 AND id = $2
            RETURNING {WASTE_COLUMNS}
            "
        ))
        .bind(company_id.as_i32())
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .map(WasteRecord::try_from)
        .transpose()?;

        let Some(record) = deleted else {
            return Ok(false);
        };

        match adjust_stock_in(
            &mut *tx,
            company_id,
            &stock_movements(Some(&record), None),
        )
        .await
        {
            Ok(()) => {}
            Err(RepositoryError::NotFound) => {
                tracing::warn!(waste_id = %id, "Wasted product no longer exists, stock not restored");
            }
            Err(e) => return Err(e),
        }

        tx.commit().await?;

        tracing::info!(waste_id = %id, company_id = %company_id, "Waste record deleted");

        Ok(true)
    }
}

/// Read the stored version of a record the insert collided with, locking it.
async fn lock_existing(
    conn: &mut PgConnection,
    id: WasteRecordId,
) -> Result<WasteRecord, RepositoryError> {
    sqlx::query_as::<_, WasteRow>(&format!(
        r"
        SELECT {WASTE_COLUMNS}
        FROM bakery.waste_records
        WHERE id = $1
        FOR UPDATE
        "
    ))
    .bind(id.as_uuid())
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)?
    .try_into()
}
