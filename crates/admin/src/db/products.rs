//! Database operations for finished products and their stock.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use bakery_core::{CompanyId, ItemCode, ProductId};

use super::{RepositoryError, map_unique_violation};
use crate::models::product::{
    CreateProductInput, Product, StockAdjustment, UpdateProductInput, consolidate_adjustments,
};

const DUPLICATE_CODE: &str = "A product with this code already exists";

const PRODUCT_COLUMNS: &str = "id, company_id, code, name, unit_price, weight_per_unit, \
                               stock_quantity, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    company_id: i32,
    code: String,
    name: String,
    unit_price: Decimal,
    weight_per_unit: Decimal,
    stock_quantity: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let code = ItemCode::parse(&row.code).map_err(|e| {
            RepositoryError::DataCorruption(format!("product {} code: {e}", row.id))
        })?;

        Ok(Self {
            id: ProductId::new(row.id),
            company_id: CompanyId::new(row.company_id),
            code,
            name: row.name,
            unit_price: row.unit_price,
            weight_per_unit: row.weight_per_unit,
            stock_quantity: row.stock_quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn validate_figures(
    unit_price: Option<Decimal>,
    weight: Option<Decimal>,
) -> Result<(), RepositoryError> {
    if unit_price.is_some_and(|p| p < Decimal::ZERO) {
        return Err(RepositoryError::Validation(
            "price cannot be negative".to_string(),
        ));
    }
    if weight.is_some_and(|w| w < Decimal::ZERO) {
        return Err(RepositoryError::Validation(
            "weight per unit cannot be negative".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for negative figures or a blank name.
    /// Returns `RepositoryError::Conflict` if the code is already used in the company.
    pub async fn create(
        &self,
        company_id: CompanyId,
        input: &CreateProductInput,
    ) -> Result<Product, RepositoryError> {
        if input.name.trim().is_empty() {
            return Err(RepositoryError::Validation("name is required".to_string()));
        }
        validate_figures(Some(input.unit_price), Some(input.weight_per_unit))?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO bakery.products
                (company_id, code, name, unit_price, weight_per_unit, stock_quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(company_id.as_i32())
        .bind(input.code.as_str())
        .bind(input.name.trim())
        .bind(input.unit_price)
        .bind(input.weight_per_unit)
        .bind(input.stock_quantity.unwrap_or(Decimal::ZERO))
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, DUPLICATE_CODE))?;

        tracing::info!(
            product_id = row.id,
            company_id = %company_id,
            code = %input.code,
            "Product created"
        );

        row.try_into()
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        company_id: CompanyId,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM bakery.products
            WHERE company_id = $1 AND id = $2
            "
        ))
        .bind(company_id.as_i32())
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// List every product of a company, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, company_id: CompanyId) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM bakery.products
            WHERE company_id = $1
            ORDER BY name, id
            "
        ))
        .bind(company_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Fetch the given products, for resolving sheet lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(
        &self,
        company_id: CompanyId,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM bakery.products
            WHERE company_id = $1 AND id = ANY($2)
            "
        ))
        .bind(company_id.as_i32())
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Update a product's descriptive fields and prices.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new code is already used.
    pub async fn update(
        &self,
        company_id: CompanyId,
        id: ProductId,
        input: &UpdateProductInput,
    ) -> Result<Product, RepositoryError> {
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(RepositoryError::Validation("name is required".to_string()));
        }
        validate_figures(input.unit_price, input.weight_per_unit)?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE bakery.products
            SET
                code = COALESCE($3, code),
                name = COALESCE($4, name),
                unit_price = COALESCE($5, unit_price),
                weight_per_unit = COALESCE($6, weight_per_unit),
                updated_at = NOW()
            WHERE company_id = $1 AND id = $2
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(company_id.as_i32())
        .bind(id.as_i32())
        .bind(input.code.as_ref().map(ItemCode::as_str))
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.unit_price)
        .bind(input.weight_per_unit)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, DUPLICATE_CODE))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete a product.
    ///
    /// # Returns
    ///
    /// Returns `true` if the product was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(
        &self,
        company_id: CompanyId,
        id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM bakery.products
            WHERE company_id = $1 AND id = $2
            ",
        )
        .bind(company_id.as_i32())
        .bind(id.as_i32())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Apply several stock movements atomically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if any product is missing; nothing
    /// is applied in that case.
    pub async fn adjust_stock(
        &self,
        company_id: CompanyId,
        adjustments: &[StockAdjustment],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        adjust_stock_in(&mut *tx, company_id, adjustments).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Apply stock movements on an open transaction.
///
/// Rows are locked in product-ID order before being updated, so two
/// transactions touching the same products cannot deadlock.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if any product is missing.
pub(crate) async fn adjust_stock_in(
    conn: &mut PgConnection,
    company_id: CompanyId,
    adjustments: &[StockAdjustment],
) -> Result<(), RepositoryError> {
    let merged = consolidate_adjustments(adjustments);
    if merged.is_empty() {
        return Ok(());
    }

    let ids: Vec<i32> = merged.iter().map(|a| a.product_id.as_i32()).collect();
    let locked: Vec<(i32, Decimal)> = sqlx::query_as(
        r"
        SELECT id, stock_quantity
        FROM bakery.products
        WHERE company_id = $1 AND id = ANY($2)
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(company_id.as_i32())
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    if locked.len() != merged.len() {
        tracing::warn!(
            company_id = %company_id,
            requested = merged.len(),
            found = locked.len(),
            "Stock adjustment references missing products"
        );
        return Err(RepositoryError::NotFound);
    }

    for (adjustment, (id, current)) in merged.iter().zip(&locked) {
        let next = current + adjustment.delta;
        if next < Decimal::ZERO {
            tracing::warn!(
                product_id = id,
                stock = %next,
                "Product stock goes negative"
            );
        }

        sqlx::query(
            r"
            UPDATE bakery.products
            SET stock_quantity = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(next)
        .execute(&mut *conn)
        .await?;
    }

    tracing::debug!(
        company_id = %company_id,
        products = merged.len(),
        "Stock adjusted"
    );

    Ok(())
}
