//! Finished product domain models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bakery_core::{CompanyId, ItemCode, ProductId};

/// A product the bakery sells (baguette, croissant, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Company owning the product.
    pub company_id: CompanyId,
    /// Business code, unique per company.
    pub code: ItemCode,
    /// Display name.
    pub name: String,
    /// Selling price of one unit.
    pub unit_price: Decimal,
    /// Weight of one unit in kilograms.
    pub weight_per_unit: Decimal,
    /// Units currently in stock. May go negative when waste outruns recorded production.
    pub stock_quantity: Decimal,
    /// When the product was created.
    pub created_at: DateTime<Utc>,
    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductInput {
    /// Business code.
    pub code: ItemCode,
    /// Display name.
    pub name: String,
    /// Selling price of one unit.
    pub unit_price: Decimal,
    /// Weight of one unit in kilograms.
    pub weight_per_unit: Decimal,
    /// Opening stock (defaults to zero).
    #[serde(default)]
    pub stock_quantity: Option<Decimal>,
}

/// Input for updating a product.
///
/// Stock is not editable here; it moves through production sheets and waste.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductInput {
    /// New business code.
    pub code: Option<ItemCode>,
    /// New display name.
    pub name: Option<String>,
    /// New selling price.
    pub unit_price: Option<Decimal>,
    /// New unit weight.
    pub weight_per_unit: Option<Decimal>,
}

/// A signed stock movement for one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    /// Product whose stock moves.
    pub product_id: ProductId,
    /// Signed quantity added to the stock.
    pub delta: Decimal,
}

/// Merge adjustments per product, drop the ones that cancel out, and order
/// them by product ID so concurrent transactions lock rows in the same order.
#[must_use]
pub fn consolidate_adjustments(adjustments: &[StockAdjustment]) -> Vec<StockAdjustment> {
    let mut merged: Vec<StockAdjustment> = Vec::with_capacity(adjustments.len());
    for adj in adjustments {
        match merged.iter_mut().find(|m| m.product_id == adj.product_id) {
            Some(existing) => existing.delta += adj.delta,
            None => merged.push(*adj),
        }
    }
    merged.retain(|m| !m.delta.is_zero());
    merged.sort_by_key(|m| m.product_id.as_i32());
    merged
}
