//! Database operations for raw materials and their price history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use bakery_core::{CompanyId, ItemCode, PriceChangeId, RawMaterialId, UnitOfMeasure};

use super::{RepositoryError, map_unique_violation};
use crate::models::raw_material::{
    ChangePriceInput, CreateRawMaterialInput, INITIAL_PRICE_JUSTIFICATION, PriceChange,
    RawMaterial, RawMaterialFilter, RawMaterialWithHistory, UpdateRawMaterialInput,
};

const DUPLICATE_CODE: &str = "A raw material with this code already exists";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct RawMaterialRow {
    id: i32,
    company_id: i32,
    code: String,
    name: String,
    unit: String,
    unit_price: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RawMaterialRow> for RawMaterial {
    type Error = RepositoryError;

    fn try_from(row: RawMaterialRow) -> Result<Self, Self::Error> {
        let code = ItemCode::parse(&row.code).map_err(|e| {
            RepositoryError::DataCorruption(format!("raw material {} code: {e}", row.id))
        })?;
        let unit: UnitOfMeasure = row.unit.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("raw material {} unit: {e}", row.id))
        })?;

        Ok(Self {
            id: RawMaterialId::new(row.id),
            company_id: CompanyId::new(row.company_id),
            code,
            name: row.name,
            unit,
            unit_price: row.unit_price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PriceChangeRow {
    id: i32,
    raw_material_id: i32,
    price: Decimal,
    justification: String,
    changed_at: DateTime<Utc>,
}

impl From<PriceChangeRow> for PriceChange {
    fn from(row: PriceChangeRow) -> Self {
        Self {
            id: PriceChangeId::new(row.id),
            raw_material_id: RawMaterialId::new(row.raw_material_id),
            price: row.price,
            justification: row.justification,
            changed_at: row.changed_at,
        }
    }
}

const MATERIAL_COLUMNS: &str =
    "id, company_id, code, name, unit, unit_price, created_at, updated_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for raw material database operations.
pub struct RawMaterialRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RawMaterialRepository<'a> {
    /// Create a new raw material repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a raw material and record its opening price in the history.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for a negative price or blank name.
    /// Returns `RepositoryError::Conflict` if the code is already used in the company.
    pub async fn create(
        &self,
        company_id: CompanyId,
        input: &CreateRawMaterialInput,
    ) -> Result<RawMaterial, RepositoryError> {
        if input.name.trim().is_empty() {
            return Err(RepositoryError::Validation("name is required".to_string()));
        }
        if input.unit_price < Decimal::ZERO {
            return Err(RepositoryError::Validation(
                "price cannot be negative".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, RawMaterialRow>(&format!(
            r"
            INSERT INTO bakery.raw_materials (company_id, code, name, unit, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {MATERIAL_COLUMNS}
            "
        ))
        .bind(company_id.as_i32())
        .bind(input.code.as_str())
        .bind(input.name.trim())
        .bind(input.unit.as_str())
        .bind(input.unit_price)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, DUPLICATE_CODE))?;

        sqlx::query(
            r"
            INSERT INTO bakery.raw_material_price_history (raw_material_id, price, justification)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(row.id)
        .bind(input.unit_price)
        .bind(INITIAL_PRICE_JUSTIFICATION)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            raw_material_id = row.id,
            company_id = %company_id,
            code = %input.code,
            "Raw material created"
        );

        row.try_into()
    }

    /// Get a raw material by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        company_id: CompanyId,
        id: RawMaterialId,
    ) -> Result<Option<RawMaterial>, RepositoryError> {
        let row = sqlx::query_as::<_, RawMaterialRow>(&format!(
            r"
            SELECT {MATERIAL_COLUMNS}
            FROM bakery.raw_materials
            WHERE company_id = $1 AND id = $2
            "
        ))
        .bind(company_id.as_i32())
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a raw material with its full price history, oldest entry first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the material doesn't exist.
    pub async fn get_with_history(
        &self,
        company_id: CompanyId,
        id: RawMaterialId,
    ) -> Result<RawMaterialWithHistory, RepositoryError> {
        let material = self
            .get(company_id, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let history = sqlx::query_as::<_, PriceChangeRow>(
            r"
            SELECT id, raw_material_id, price, justification, changed_at
            FROM bakery.raw_material_price_history
            WHERE raw_material_id = $1
            ORDER BY changed_at, id
            ",
        )
        .bind(id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(RawMaterialWithHistory {
            material,
            price_history: history.into_iter().map(Into::into).collect(),
        })
    }

    /// List raw materials, optionally searching code and name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        company_id: CompanyId,
        filter: &RawMaterialFilter,
    ) -> Result<Vec<RawMaterial>, RepositoryError> {
        let limit = filter.limit.unwrap_or(200);
        let offset = filter.offset.unwrap_or(0);

        let rows = sqlx::query_as::<_, RawMaterialRow>(&format!(
            r"
            SELECT {MATERIAL_COLUMNS}
            FROM bakery.raw_materials
            WHERE company_id = $1
                AND ($2::text IS NULL OR code ILIKE '%' || $2 || '%' OR name ILIKE '%' || $2 || '%')
            ORDER BY name, id
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(company_id.as_i32())
        .bind(filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Fetch the given materials, for resolving sheet lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(
        &self,
        company_id: CompanyId,
        ids: &[RawMaterialId],
    ) -> Result<Vec<RawMaterial>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(RawMaterialId::as_i32).collect();
        let rows = sqlx::query_as::<_, RawMaterialRow>(&format!(
            r"
            SELECT {MATERIAL_COLUMNS}
            FROM bakery.raw_materials
            WHERE company_id = $1 AND id = ANY($2)
            "
        ))
        .bind(company_id.as_i32())
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Update a raw material's code, name or unit.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the material doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new code is already used.
    pub async fn update(
        &self,
        company_id: CompanyId,
        id: RawMaterialId,
        input: &UpdateRawMaterialInput,
    ) -> Result<RawMaterial, RepositoryError> {
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(RepositoryError::Validation("name is required".to_string()));
        }

        let row = sqlx::query_as::<_, RawMaterialRow>(&format!(
            r"
            UPDATE bakery.raw_materials
            SET
                code = COALESCE($3, code),
                name = COALESCE($4, name),
                unit = COALESCE($5, unit),
                updated_at = NOW()
            WHERE company_id = $1 AND id = $2
            RETURNING {MATERIAL_COLUMNS}
            "
        ))
        .bind(company_id.as_i32())
        .bind(id.as_i32())
        .bind(input.code.as_ref().map(ItemCode::as_str))
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.unit.map(UnitOfMeasure::as_str))
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, DUPLICATE_CODE))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Change the current price and append the change to the history, atomically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` if the price is negative or the
    /// justification blank.
    /// Returns `RepositoryError::NotFound` if the material doesn't exist.
    pub async fn change_price(
        &self,
        company_id: CompanyId,
        id: RawMaterialId,
        input: &ChangePriceInput,
    ) -> Result<RawMaterialWithHistory, RepositoryError> {
        input.validate().map_err(RepositoryError::Validation)?;

        let mut tx = self.pool.begin().await?;

        let previous: Option<Decimal> = sqlx::query_scalar(
            r"
            SELECT unit_price FROM bakery.raw_materials
            WHERE company_id = $1 AND id = $2
            FOR UPDATE
            ",
        )
        .bind(company_id.as_i32())
        .bind(id.as_i32())
        .fetch_optional(&mut *tx)
        .await?;
        let previous = previous.ok_or(RepositoryError::NotFound)?;

        sqlx::query(
            r"
            UPDATE bakery.raw_materials
            SET unit_price = $3, updated_at = NOW()
            WHERE company_id = $1 AND id = $2
            ",
        )
        .bind(company_id.as_i32())
        .bind(id.as_i32())
        .bind(input.price)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO bakery.raw_material_price_history (raw_material_id, price, justification)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(id.as_i32())
        .bind(input.price)
        .bind(input.justification.trim())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            raw_material_id = %id,
            company_id = %company_id,
            previous_price = %previous,
            new_price = %input.price,
            "Raw material price changed"
        );

        self.get_with_history(company_id, id).await
    }

    /// Delete a raw material and its price history.
    ///
    /// Existing production sheets keep their line snapshots.
    ///
    /// # Returns
    ///
    /// Returns `true` if the material was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(
        &self,
        company_id: CompanyId,
        id: RawMaterialId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM bakery.raw_materials
            WHERE company_id = $1 AND id = $2
            ",
        )
        .bind(company_id.as_i32())
        .bind(id.as_i32())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
