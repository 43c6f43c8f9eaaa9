//! Production-sheet calculator.
//!
//! A production sheet records one production run: the raw materials consumed
//! and the products baked. This module derives the sheet totals (weights, cost,
//! production amount, profitability) and validates the lines before a sheet is
//! accepted.
//!
//! Everything here is pure decimal arithmetic: no I/O, no clock, no floats.

use std::collections::HashSet;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ProductId, RawMaterialId, UnitOfMeasure};

/// Number of decimal places kept on every derived figure.
pub const TOTALS_SCALE: u32 = 2;

/// Largest quantity, price or weight accepted on a sheet line.
pub const MAX_LINE_VALUE: Decimal = Decimal::from_parts(10_000_000, 0, 0, false, 0);

/// Decimal places accepted on a sheet line value.
pub const LINE_SCALE: u32 = 4;

/// Lines accepted on each side of a sheet.
pub const MAX_SHEET_LINES: usize = 200;

/// Errors raised when a sheet's lines are not acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductionError {
    /// A sheet needs at least one material line and one product line.
    #[error("a production sheet needs at least one material and one product")]
    EmptySheet,

    /// The same raw material was selected on two lines.
    #[error("raw material {0} is selected more than once")]
    DuplicateMaterial(RawMaterialId),

    /// The same product was entered on two lines.
    #[error("product {0} is entered more than once")]
    DuplicateProduct(ProductId),

    /// A line quantity is zero or negative.
    #[error("{kind} line {line}: quantity must be greater than zero")]
    InvalidQuantity {
        /// `"material"` or `"product"`.
        kind: &'static str,
        /// 1-based line number.
        line: usize,
    },

    /// A price or weight is negative.
    #[error("{kind} line {line}: {field} cannot be negative")]
    NegativeAmount {
        /// `"material"` or `"product"`.
        kind: &'static str,
        /// 1-based line number.
        line: usize,
        /// Name of the offending field.
        field: &'static str,
    },

    /// A quantity, price or weight is above [`MAX_LINE_VALUE`].
    #[error("{kind} line {line}: {field} cannot exceed 10000000")]
    OutOfRange {
        /// `"material"` or `"product"`.
        kind: &'static str,
        /// 1-based line number.
        line: usize,
        /// Name of the offending field.
        field: &'static str,
    },

    /// A quantity, price or weight has more than [`LINE_SCALE`] decimals.
    #[error("{kind} line {line}: {field} cannot have more than 4 decimals")]
    TooPrecise {
        /// `"material"` or `"product"`.
        kind: &'static str,
        /// 1-based line number.
        line: usize,
        /// Name of the offending field.
        field: &'static str,
    },

    /// More than [`MAX_SHEET_LINES`] lines on one side of the sheet.
    #[error("a production sheet accepts at most 200 {kind} lines")]
    TooManyLines {
        /// `"material"` or `"product"`.
        kind: &'static str,
    },

    /// A derived figure does not fit in a decimal.
    #[error("sheet figures are too large to compute")]
    Overflow,
}

/// A raw material consumed by a production run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialLine {
    /// Raw material consumed.
    pub material_id: RawMaterialId,
    /// Quantity consumed, expressed in `unit`.
    pub quantity: Decimal,
    /// Price of one `unit` of the material.
    pub unit_price: Decimal,
    /// Unit of measure of `quantity` and `unit_price`.
    pub unit: UnitOfMeasure,
}

impl MaterialLine {
    /// Cost of this line (`quantity * unit_price`), unrounded.
    ///
    /// # Errors
    ///
    /// Returns [`ProductionError::Overflow`] if the product does not fit.
    pub fn cost(&self) -> Result<Decimal, ProductionError> {
        checked_product(self.quantity, self.unit_price)
    }

    /// Weight contributed to the material total, in kilograms.
    #[must_use]
    pub fn aggregate_weight(&self) -> Decimal {
        self.unit.to_aggregate_weight(self.quantity)
    }
}

/// A product produced by a production run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLine {
    /// Product baked.
    pub product_id: ProductId,
    /// Number of units produced.
    pub quantity: Decimal,
    /// Selling price of one unit.
    pub unit_price: Decimal,
    /// Weight of one unit, in kilograms.
    pub weight_per_unit: Decimal,
}

impl ProductLine {
    /// Sales value of this line (`quantity * unit_price`), unrounded.
    ///
    /// # Errors
    ///
    /// Returns [`ProductionError::Overflow`] if the product does not fit.
    pub fn amount(&self) -> Result<Decimal, ProductionError> {
        checked_product(self.quantity, self.unit_price)
    }

    /// Weight of this line (`quantity * weight_per_unit`), unrounded.
    ///
    /// # Errors
    ///
    /// Returns [`ProductionError::Overflow`] if the product does not fit.
    pub fn weight(&self) -> Result<Decimal, ProductionError> {
        checked_product(self.quantity, self.weight_per_unit)
    }
}

/// Derived totals of a production sheet. Every figure has two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SheetTotals {
    /// Total material weight in kilograms (grams converted).
    pub material_weight: Decimal,
    /// Total material cost.
    pub material_cost: Decimal,
    /// Total number of units produced.
    pub production_quantity: Decimal,
    /// Total produced weight in kilograms.
    pub production_weight: Decimal,
    /// Total sales value of the production.
    pub production_amount: Decimal,
    /// `(production_amount - material_cost) / production_amount * 100`.
    pub profitability_rate: Decimal,
    /// `production_weight - material_weight`.
    pub weight_difference: Decimal,
}

/// Round a figure to [`TOTALS_SCALE`] decimals, midpoint away from zero.
#[must_use]
pub fn round_figure(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(TOTALS_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

fn checked_product(left: Decimal, right: Decimal) -> Result<Decimal, ProductionError> {
    left.checked_mul(right).ok_or(ProductionError::Overflow)
}

fn checked_sum<I>(values: I) -> Result<Decimal, ProductionError>
where
    I: IntoIterator<Item = Result<Decimal, ProductionError>>,
{
    values.into_iter().try_fold(Decimal::ZERO, |total, value| {
        total.checked_add(value?).ok_or(ProductionError::Overflow)
    })
}

/// Profitability rate in percent, rounded to two decimals.
///
/// Returns zero when `production_amount` is zero.
///
/// # Errors
///
/// Returns [`ProductionError::Overflow`] if the rate does not fit.
pub fn profitability_rate(
    production_amount: Decimal,
    material_cost: Decimal,
) -> Result<Decimal, ProductionError> {
    if production_amount.is_zero() {
        return Ok(Decimal::ZERO);
    }
    production_amount
        .checked_sub(material_cost)
        .and_then(|margin| margin.checked_div(production_amount))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(round_figure)
        .ok_or(ProductionError::Overflow)
}

/// Compute the totals of a sheet from its lines.
///
/// The rate and the weight difference are derived from the already rounded
/// totals, so recomputing them from the returned figures gives the same values.
///
/// # Errors
///
/// Returns [`ProductionError::Overflow`] when a line or a total does not fit
/// in a decimal. Lines that passed [`validate_sheet`] never overflow.
pub fn compute_totals(
    materials: &[MaterialLine],
    products: &[ProductLine],
) -> Result<SheetTotals, ProductionError> {
    let material_weight = round_figure(checked_sum(
        materials.iter().map(|m| Ok(m.aggregate_weight())),
    )?);
    let material_cost = round_figure(checked_sum(materials.iter().map(MaterialLine::cost))?);

    let production_quantity = round_figure(checked_sum(products.iter().map(|p| Ok(p.quantity)))?);
    let production_weight = round_figure(checked_sum(products.iter().map(ProductLine::weight))?);
    let production_amount = round_figure(checked_sum(products.iter().map(ProductLine::amount))?);

    let weight_difference = production_weight
        .checked_sub(material_weight)
        .ok_or(ProductionError::Overflow)?;

    Ok(SheetTotals {
        material_weight,
        material_cost,
        production_quantity,
        production_weight,
        production_amount,
        profitability_rate: profitability_rate(production_amount, material_cost)?,
        weight_difference,
    })
}

/// Reject a line value above [`MAX_LINE_VALUE`] or finer than [`LINE_SCALE`].
fn check_value(
    kind: &'static str,
    line: usize,
    field: &'static str,
    value: Decimal,
) -> Result<(), ProductionError> {
    if value > MAX_LINE_VALUE {
        return Err(ProductionError::OutOfRange { kind, line, field });
    }
    if value.normalize().scale() > LINE_SCALE {
        return Err(ProductionError::TooPrecise { kind, line, field });
    }
    Ok(())
}

/// Check that a sheet's lines can be saved.
///
/// # Errors
///
/// Returns the first problem found: an empty or oversized side, a duplicate
/// material or product, a non-positive quantity, a negative price / weight or
/// a value outside [`MAX_LINE_VALUE`] and [`LINE_SCALE`].
pub fn validate_sheet(
    materials: &[MaterialLine],
    products: &[ProductLine],
) -> Result<(), ProductionError> {
    if materials.is_empty() || products.is_empty() {
        return Err(ProductionError::EmptySheet);
    }
    if materials.len() > MAX_SHEET_LINES {
        return Err(ProductionError::TooManyLines { kind: "material" });
    }
    if products.len() > MAX_SHEET_LINES {
        return Err(ProductionError::TooManyLines { kind: "product" });
    }

    let mut seen_materials = HashSet::with_capacity(materials.len());
    for (idx, line) in materials.iter().enumerate() {
        let line_no = idx + 1;
        if !seen_materials.insert(line.material_id) {
            return Err(ProductionError::DuplicateMaterial(line.material_id));
        }
        if line.quantity <= Decimal::ZERO {
            return Err(ProductionError::InvalidQuantity {
                kind: "material",
                line: line_no,
            });
        }
        if line.unit_price < Decimal::ZERO {
            return Err(ProductionError::NegativeAmount {
                kind: "material",
                line: line_no,
                field: "unit price",
            });
        }
        check_value("material", line_no, "quantity", line.quantity)?;
        check_value("material", line_no, "unit price", line.unit_price)?;
    }

    let mut seen_products = HashSet::with_capacity(products.len());
    for (idx, line) in products.iter().enumerate() {
        let line_no = idx + 1;
        if !seen_products.insert(line.product_id) {
            return Err(ProductionError::DuplicateProduct(line.product_id));
        }
        if line.quantity <= Decimal::ZERO {
            return Err(ProductionError::InvalidQuantity {
                kind: "product",
                line: line_no,
            });
        }
        if line.unit_price < Decimal::ZERO {
            return Err(ProductionError::NegativeAmount {
                kind: "product",
                line: line_no,
                field: "unit price",
            });
        }
        if line.weight_per_unit < Decimal::ZERO {
            return Err(ProductionError::NegativeAmount {
                kind: "product",
                line: line_no,
                field: "weight per unit",
            });
        }
        check_value("product", line_no, "quantity", line.quantity)?;
        check_value("product", line_no, "unit price", line.unit_price)?;
        check_value("product", line_no, "weight per unit", line.weight_per_unit)?;
    }

    Ok(())
}

/// Validate then compute, the way the sheet form does on every change.
///
/// # Errors
///
/// See [`validate_sheet`] and [`compute_totals`].
pub fn evaluate_sheet(
    materials: &[MaterialLine],
    products: &[ProductLine],
) -> Result<SheetTotals, ProductionError> {
    validate_sheet(materials, products)?;
    compute_totals(materials, products)
}
