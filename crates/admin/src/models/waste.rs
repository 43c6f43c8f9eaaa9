//! Waste (spoilage) records.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bakery_core::production::{LINE_SCALE, MAX_LINE_VALUE};
use bakery_core::{CompanyId, ProductId, SyncStatus, WasteReason, WasteRecordId};

use super::product::StockAdjustment;

/// A quantity of a product thrown away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasteRecord {
    /// Client-generated ID, stable across the offline cache and the remote store.
    pub id: WasteRecordId,
    /// Company owning the record.
    pub company_id: CompanyId,
    /// Product wasted.
    pub product_id: ProductId,
    /// Quantity wasted, always positive.
    pub quantity: Decimal,
    /// Why it was wasted.
    pub reason: WasteReason,
    /// When the waste happened.
    pub recorded_at: DateTime<Utc>,
    /// Who entered the record.
    pub operator: String,
    /// Last modification, used for last-write-wins.
    pub updated_at: DateTime<Utc>,
    /// Whether the record has reached the remote store.
    #[serde(default)]
    pub sync_status: SyncStatus,
}

impl WasteRecord {
    /// Build a new, unsynced record from form input.
    ///
    /// # Errors
    ///
    /// Returns a message when the input is invalid (see [`CreateWasteInput::validate`]).
    pub fn new(
        company_id: CompanyId,
        operator: &str,
        input: &CreateWasteInput,
        now: DateTime<Utc>,
    ) -> Result<Self, String> {
        input.validate()?;
        Ok(Self {
            id: input.id.unwrap_or_else(WasteRecordId::generate),
            company_id,
            product_id: input.product_id,
            quantity: input.quantity,
            reason: input.reason,
            recorded_at: input.recorded_at.unwrap_or(now),
            operator: operator.to_string(),
            updated_at: now,
            sync_status: SyncStatus::Unsynced,
        })
    }

    /// Last-write-wins: `true` when this version should replace `other`.
    ///
    /// Equal timestamps count as newer so that re-sending the same version is
    /// accepted.
    #[must_use]
    pub fn supersedes(&self, other: &Self) -> bool {
        self.updated_at >= other.updated_at
    }

    /// Same record flagged with a new sync status.
    #[must_use]
    pub fn with_sync_status(mut self, status: SyncStatus) -> Self {
        self.sync_status = status;
        self
    }
}

/// Input for recording waste.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWasteInput {
    /// Optional client-generated ID, to make retries idempotent.
    #[serde(default)]
    pub id: Option<WasteRecordId>,
    /// Product wasted.
    pub product_id: ProductId,
    /// Quantity wasted.
    pub quantity: Decimal,
    /// Why it was wasted.
    pub reason: WasteReason,
    /// When it happened. Defaults to now.
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl CreateWasteInput {
    /// Check the input before it is stored.
    ///
    /// # Errors
    ///
    /// Returns a message when the quantity is not strictly positive or is
    /// outside the range a sheet line accepts.
    pub fn validate(&self) -> Result<(), String> {
        if self.quantity <= Decimal::ZERO {
            return Err("waste quantity must be greater than zero".to_string());
        }
        if self.quantity > MAX_LINE_VALUE {
            return Err("waste quantity cannot exceed 10000000".to_string());
        }
        if self.quantity.normalize().scale() > LINE_SCALE {
            return Err("waste quantity cannot have more than 4 decimals".to_string());
        }
        Ok(())
    }
}

/// Filter criteria for listing waste records.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WasteFilter {
    /// First day included.
    pub from: Option<NaiveDate>,
    /// Last day included.
    pub to: Option<NaiveDate>,
    /// Only records with this reason.
    pub reason: Option<WasteReason>,
    /// Maximum number of results.
    pub limit: Option<i64>,
}

impl WasteFilter {
    /// Whether a record falls inside this filter.
    #[must_use]
    pub fn matches(&self, record: &WasteRecord) -> bool {
        let day = record.recorded_at.date_naive();
        self.from.is_none_or(|from| day >= from)
            && self.to.is_none_or(|to| day <= to)
            && self.reason.is_none_or(|reason| record.reason == reason)
    }
}

/// Stock movements turning `previous` into `next`.
///
/// Waste takes quantity out of stock, so a new record subtracts and a
/// replaced record gives its old quantity back first. Pass `None` as `next`
/// for a deletion.
#[must_use]
pub fn stock_movements(
    previous: Option<&WasteRecord>,
    next: Option<&WasteRecord>,
) -> Vec<StockAdjustment> {
    let mut movements = Vec::with_capacity(2);
    if let Some(prev) = previous {
        movements.push(StockAdjustment {
            product_id: prev.product_id,
            delta: prev.quantity,
        });
    }
    if let Some(next) = next {
        movements.push(StockAdjustment {
            product_id: next.product_id,
            delta: -next.quantity,
        });
    }
    movements
}

/// Response to a waste entry.
#[derive(Debug, Clone, Serialize)]
pub struct WasteEntryResult {
    /// The stored record.
    pub record: WasteRecord,
    /// `false` when the remote store could not be reached and the record
    /// only lives in the offline cache for now.
    pub synced: bool,
}
