//! Production sheet domain models.
//!
//! A sheet stores a snapshot of every line (code, name, price) so that it
//! still prints correctly after the catalogue changes.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bakery_core::{
    CompanyId, MaterialLine, ProductId, ProductLine, ProductionSheetId, RawMaterialId,
    SheetTotals, UnitOfMeasure,
};

use super::product::{Product, StockAdjustment};
use super::raw_material::RawMaterial;

/// A recorded production run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionSheet {
    /// Unique sheet ID.
    pub id: ProductionSheetId,
    /// Company owning the sheet.
    pub company_id: CompanyId,
    /// Day the production happened.
    pub production_date: NaiveDate,
    /// Person responsible for the run.
    pub responsible: String,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Derived totals, computed when the sheet was saved.
    pub totals: SheetTotals,
    /// Raw materials consumed, in entry order.
    pub materials: Vec<SheetMaterialLine>,
    /// Products baked, in entry order.
    pub products: Vec<SheetProductLine>,
    /// When the sheet was created.
    pub created_at: DateTime<Utc>,
    /// When the sheet was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ProductionSheet {
    /// Stock movements caused by this sheet: every produced quantity is added.
    #[must_use]
    pub fn stock_increments(&self) -> Vec<StockAdjustment> {
        self.products
            .iter()
            .map(|line| StockAdjustment {
                product_id: line.product_id,
                delta: line.quantity,
            })
            .collect()
    }
}

/// Sheet without its lines, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionSheetSummary {
    /// Unique sheet ID.
    pub id: ProductionSheetId,
    /// Day the production happened.
    pub production_date: NaiveDate,
    /// Person responsible for the run.
    pub responsible: String,
    /// Derived totals.
    pub totals: SheetTotals,
    /// When the sheet was created.
    pub created_at: DateTime<Utc>,
}

/// Stored raw material line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetMaterialLine {
    pub raw_material_id: RawMaterialId,
    pub code: String,
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub unit: UnitOfMeasure,
}

impl SheetMaterialLine {
    /// The calculator view of this line.
    #[must_use]
    pub const fn to_line(&self) -> MaterialLine {
        MaterialLine {
            material_id: self.raw_material_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            unit: self.unit,
        }
    }
}

/// Stored product line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetProductLine {
    pub product_id: ProductId,
    pub code: String,
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub weight_per_unit: Decimal,
}

impl SheetProductLine {
    /// The calculator view of this line.
    #[must_use]
    pub const fn to_line(&self) -> ProductLine {
        ProductLine {
            product_id: self.product_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            weight_per_unit: self.weight_per_unit,
        }
    }
}

/// A material line as entered on the form.
///
/// Price and unit default to the material's current values when omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct MaterialLineInput {
    pub raw_material_id: RawMaterialId,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub unit: Option<UnitOfMeasure>,
}

/// A product line as entered on the form.
///
/// Price and unit weight default to the product's current values when omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductLineInput {
    pub product_id: ProductId,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub weight_per_unit: Option<Decimal>,
}

/// Input for creating a production sheet.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductionSheetInput {
    /// Day the production happened.
    pub production_date: NaiveDate,
    /// Person responsible. Defaults to the operator submitting the sheet.
    #[serde(default)]
    pub responsible: Option<String>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Raw materials consumed.
    pub materials: Vec<MaterialLineInput>,
    /// Products baked.
    pub products: Vec<ProductLineInput>,
}

/// Body of the live totals calculator.
#[derive(Debug, Clone, Deserialize)]
pub struct TotalsRequest {
    #[serde(default)]
    pub materials: Vec<MaterialLine>,
    #[serde(default)]
    pub products: Vec<ProductLine>,
}

/// Filter criteria for listing production sheets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductionSheetFilter {
    /// First production date included.
    pub from: Option<NaiveDate>,
    /// Last production date included.
    pub to: Option<NaiveDate>,
    /// Maximum number of results.
    pub limit: Option<i64>,
    /// Number of results to skip.
    pub offset: Option<i64>,
}

/// A form line referenced something missing from the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineResolutionError {
    #[error("raw material {0} does not exist")]
    UnknownMaterial(RawMaterialId),
    #[error("product {0} does not exist")]
    UnknownProduct(ProductId),
    #[error("raw material {material} is priced per {catalogue}; give a unit price for {unit}")]
    PriceRequiredForUnit {
        material: RawMaterialId,
        catalogue: UnitOfMeasure,
        unit: UnitOfMeasure,
    },
}

/// Fill in the defaults of material lines from the current catalogue.
///
/// # Errors
///
/// Returns [`LineResolutionError::UnknownMaterial`] when a line references a
/// material not present in `catalogue`, and
/// [`LineResolutionError::PriceRequiredForUnit`] when a line changes the unit
/// without giving a price in that unit.
pub fn resolve_material_lines(
    inputs: &[MaterialLineInput],
    catalogue: &[RawMaterial],
) -> Result<Vec<SheetMaterialLine>, LineResolutionError> {
    inputs
        .iter()
        .map(|input| {
            let material = catalogue
                .iter()
                .find(|m| m.id == input.raw_material_id)
                .ok_or(LineResolutionError::UnknownMaterial(input.raw_material_id))?;
            let unit = input.unit.unwrap_or(material.unit);
            // The catalogue price is per the catalogue unit.
            let unit_price = match input.unit_price {
                Some(price) => price,
                None if unit == material.unit => material.unit_price,
                None => {
                    return Err(LineResolutionError::PriceRequiredForUnit {
                        material: material.id,
                        catalogue: material.unit,
                        unit,
                    });
                }
            };
            Ok(SheetMaterialLine {
                raw_material_id: material.id,
                code: material.code.to_string(),
                name: material.name.clone(),
                quantity: input.quantity,
                unit_price,
                unit,
            })
        })
        .collect()
}

/// Fill in the defaults of product lines from the current catalogue.
///
/// # Errors
///
/// Returns [`LineResolutionError::UnknownProduct`] when a line references a
/// product not present in `catalogue`.
pub fn resolve_product_lines(
    inputs: &[ProductLineInput],
    catalogue: &[Product],
) -> Result<Vec<SheetProductLine>, LineResolutionError> {
    inputs
        .iter()
        .map(|input| {
            let product = catalogue
                .iter()
                .find(|p| p.id == input.product_id)
                .ok_or(LineResolutionError::UnknownProduct(input.product_id))?;
            Ok(SheetProductLine {
                product_id: product.id,
                code: product.code.to_string(),
                name: product.name.clone(),
                quantity: input.quantity,
                unit_price: input.unit_price.unwrap_or(product.unit_price),
                weight_per_unit: input.weight_per_unit.unwrap_or(product.weight_per_unit),
            })
        })
        .collect()
}
