//! Database operations for production sheets.
//!
//! Saving a sheet validates its lines, computes the totals and adds the
//! produced quantities to product stock, all inside one transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use bakery_core::{
    CompanyId, MaterialLine, ProductId, ProductLine, ProductionSheetId, RawMaterialId,
    SheetTotals, UnitOfMeasure, evaluate_sheet,
};

use super::RepositoryError;
use super::products::{ProductRepository, adjust_stock_in};
use super::raw_materials::RawMaterialRepository;
use crate::models::product::StockAdjustment;
use crate::models::production::{
    CreateProductionSheetInput, ProductionSheet, ProductionSheetFilter, ProductionSheetSummary,
    SheetMaterialLine, SheetProductLine, resolve_material_lines, resolve_product_lines,
};

const SHEET_COLUMNS: &str = "id, company_id, production_date, responsible, notes, \
                             material_weight, material_cost, production_quantity, \
                             production_weight, production_amount, profitability_rate, \
                             weight_difference, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct SheetRow {
    id: i32,
    company_id: i32,
    production_date: NaiveDate,
    responsible: String,
    notes: Option<String>,
    material_weight: Decimal,
    material_cost: Decimal,
    production_quantity: Decimal,
    production_weight: Decimal,
    production_amount: Decimal,
    profitability_rate: Decimal,
    weight_difference: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SheetRow {
    const fn totals(&self) -> SheetTotals {
        SheetTotals {
            material_weight: self.material_weight,
            material_cost: self.material_cost,
            production_quantity: self.production_quantity,
            production_weight: self.production_weight,
            production_amount: self.production_amount,
            profitability_rate: self.profitability_rate,
            weight_difference: self.weight_difference,
        }
    }

    fn into_sheet(
        self,
        materials: Vec<SheetMaterialLine>,
        products: Vec<SheetProductLine>,
    ) -> ProductionSheet {
        ProductionSheet {
            id: ProductionSheetId::new(self.id),
            company_id: CompanyId::new(self.company_id),
            production_date: self.production_date,
            totals: self.totals(),
            responsible: self.responsible,
            notes: self.notes,
            materials,
            products,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<SheetRow> for ProductionSheetSummary {
    fn from(row: SheetRow) -> Self {
        Self {
            id: ProductionSheetId::new(row.id),
            production_date: row.production_date,
            totals: row.totals(),
            responsible: row.responsible,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MaterialLineRow {
    raw_material_id: i32,
    material_code: String,
    material_name: String,
    quantity: Decimal,
    unit_price: Decimal,
    unit: String,
}

impl TryFrom<MaterialLineRow> for SheetMaterialLine {
    type Error = RepositoryError;

    fn try_from(row: MaterialLineRow) -> Result<Self, Self::Error> {
        let unit: UnitOfMeasure = row.unit.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("sheet material line unit: {e}"))
        })?;
        Ok(Self {
            raw_material_id: RawMaterialId::new(row.raw_material_id),
            code: row.material_code,
            name: row.material_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
            unit,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductLineRow {
    product_id: i32,
    product_code: String,
    product_name: String,
    quantity: Decimal,
    unit_price: Decimal,
    weight_per_unit: Decimal,
}

impl From<ProductLineRow> for SheetProductLine {
    fn from(row: ProductLineRow) -> Self {
        Self {
            product_id: ProductId::new(row.product_id),
            code: row.product_code,
            name: row.product_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
            weight_per_unit: row.weight_per_unit,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for production sheet database operations.
pub struct ProductionSheetRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductionSheetRepository<'a> {
    /// Create a new production sheet repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Save a production sheet.
    ///
    /// Missing line prices are taken from the catalogue, the totals are
    /// computed, and the produced quantities are added to product stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` if a line references an unknown
    /// material or product, or the lines fail validation.
    /// Returns `RepositoryError::Database` for other database errors; nothing
    /// is saved in that case.
    pub async fn create(
        &self,
        company_id: CompanyId,
        operator: &str,
        input: &CreateProductionSheetInput,
    ) -> Result<ProductionSheet, RepositoryError> {
        let responsible = input
            .responsible
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(operator)
            .to_string();

        let material_ids: Vec<RawMaterialId> =
            input.materials.iter().map(|m| m.raw_material_id).collect();
        let product_ids: Vec<ProductId> = input.products.iter().map(|p| p.product_id).collect();

        let catalogue_materials = RawMaterialRepository::new(self.pool)
            .get_many(company_id, &material_ids)
            .await?;
        let catalogue_products = ProductRepository::new(self.pool)
            .get_many(company_id, &product_ids)
            .await?;

        let materials = resolve_material_lines(&input.materials, &catalogue_materials)
            .map_err(|e| RepositoryError::Validation(e.to_string()))?;
        let products = resolve_product_lines(&input.products, &catalogue_products)
            .map_err(|e| RepositoryError::Validation(e.to_string()))?;

        let material_lines: Vec<MaterialLine> =
            materials.iter().map(SheetMaterialLine::to_line).collect();
        let product_lines: Vec<ProductLine> =
            products.iter().map(SheetProductLine::to_line).collect();
        let totals = evaluate_sheet(&material_lines, &product_lines)
            .map_err(|e| RepositoryError::Validation(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, SheetRow>(&format!(
            r"
            INSERT INTO bakery.production_sheets (
                company_id, production_date, responsible, notes,
                material_weight, material_cost, production_quantity,
                production_weight, production_amount, profitability_rate,
                weight_difference
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {SHEET_COLUMNS}
            "
        ))
        .bind(company_id.as_i32())
        .bind(input.production_date)
        .bind(&responsible)
        .bind(input.notes.as_deref())
        .bind(totals.material_weight)
        .bind(totals.material_cost)
        .bind(totals.production_quantity)
        .bind(totals.production_weight)
        .bind(totals.production_amount)
        .bind(totals.profitability_rate)
        .bind(totals.weight_difference)
        .fetch_one(&mut *tx)
        .await?;

        for (line_no, line) in (1_i32..).zip(&materials) {
            sqlx::query(
                r"
                INSERT INTO bakery.production_sheet_materials (
                    sheet_id, line_no, raw_material_id, material_code, material_name,
                    quantity, unit_price, unit
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(row.id)
            .bind(line_no)
            .bind(line.raw_material_id.as_i32())
            .bind(&line.code)
            .bind(&line.name)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.unit.as_str())
            .execute(&mut *tx)
            .await?;
        }

        for (line_no, line) in (1_i32..).zip(&products) {
            sqlx::query(
                r"
                INSERT INTO bakery.production_sheet_products (
                    sheet_id, line_no, product_id, product_code, product_name,
                    quantity, unit_price, weight_per_unit
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(row.id)
            .bind(line_no)
            .bind(line.product_id.as_i32())
            .bind(&line.code)
            .bind(&line.name)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.weight_per_unit)
            .execute(&mut *tx)
            .await?;
        }

        let sheet = row.into_sheet(materials, products);
        adjust_stock_in(&mut *tx, company_id, &sheet.stock_increments()).await?;

        tx.commit().await?;

        tracing::info!(
            sheet_id = %sheet.id,
            company_id = %company_id,
            production_date = %sheet.production_date,
            material_cost = %sheet.totals.material_cost,
            production_amount = %sheet.totals.production_amount,
            profitability_rate = %sheet.totals.profitability_rate,
            "Production sheet saved"
        );

        Ok(sheet)
    }

    /// Get a production sheet with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        company_id: CompanyId,
        id: ProductionSheetId,
    ) -> Result<Option<ProductionSheet>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, SheetRow>(&format!(
            r"
            SELECT {SHEET_COLUMNS}
            FROM bakery.production_sheets
            WHERE company_id = $1 AND id = $2
            "
        ))
        .bind(company_id.as_i32())
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let materials = sqlx::query_as::<_, MaterialLineRow>(
            r"
            SELECT raw_material_id, material_code, material_name, quantity, unit_price, unit
            FROM bakery.production_sheet_materials
            WHERE sheet_id = $1
            ORDER BY line_no
            ",
        )
        .bind(id.as_i32())
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(TryInto::try_into)
        .collect::<Result<Vec<_>, _>>()?;

        let products = sqlx::query_as::<_, ProductLineRow>(
            r"
            SELECT product_id, product_code, product_name, quantity, unit_price, weight_per_unit
            FROM bakery.production_sheet_products
            WHERE sheet_id = $1
            ORDER BY line_no
            ",
        )
        .bind(id.as_i32())
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        Ok(Some(row.into_sheet(materials, products)))
    }

    /// List sheets, newest production date first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        company_id: CompanyId,
        filter: &ProductionSheetFilter,
    ) -> Result<Vec<ProductionSheetSummary>, RepositoryError> {
        let limit = filter.limit.unwrap_or(100);
        let offset = filter.offset.unwrap_or(0);

        let rows = sqlx::query_as::<_, SheetRow>(&format!(
            r"
            SELECT {SHEET_COLUMNS}
            FROM bakery.production_sheets
            WHERE company_id = $1
                AND ($2::date IS NULL OR production_date >= $2)
                AND ($3::date IS NULL OR production_date <= $3)
            ORDER BY production_date DESC, id DESC
            LIMIT $4 OFFSET $5
            "
        ))
        .bind(company_id.as_i32())
        .bind(filter.from)
        .bind(filter.to)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Delete a sheet and take its produced quantities back out of stock.
    ///
    /// # Returns
    ///
    /// Returns `true` if the sheet was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(
        &self,
        company_id: CompanyId,
        id: ProductionSheetId,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Products deleted since the sheet was saved have no stock to restore.
        let produced: Vec<(i32, Decimal)> = sqlx::query_as(
            r"
            SELECT l.product_id, l.quantity
            FROM bakery.production_sheet_products l
            JOIN bakery.production_sheets s ON s.id = l.sheet_id
            JOIN bakery.products p ON p.id = l.product_id AND p.company_id = s.company_id
            WHERE s.company_id = $1 AND s.id = $2
            ",
        )
        .bind(company_id.as_i32())
        .bind(id.as_i32())
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query(
            r"
            DELETE FROM bakery.production_sheets
            WHERE company_id = $1 AND id = $2
            ",
        )
        .bind(company_id.as_i32())
        .bind(id.as_i32())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        let reversals: Vec<StockAdjustment> = produced
            .into_iter()
            .map(|(product_id, quantity)| StockAdjustment {
                product_id: ProductId::new(product_id),
                delta: -quantity,
            })
            .collect();

        adjust_stock_in(&mut *tx, company_id, &reversals).await?;

        tx.commit().await?;

        tracing::info!(sheet_id = %id, company_id = %company_id, "Production sheet deleted");

        Ok(true)
    }
}
