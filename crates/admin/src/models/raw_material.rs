//! Raw material domain models with their price history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bakery_core::{CompanyId, ItemCode, PriceChangeId, RawMaterialId, UnitOfMeasure};

/// Justification recorded for the first entry of a material's price history.
pub const INITIAL_PRICE_JUSTIFICATION: &str = "Initial price";

/// A raw material stocked by the bakery (flour, butter, yeast, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMaterial {
    /// Unique material ID.
    pub id: RawMaterialId,
    /// Company owning the material.
    pub company_id: CompanyId,
    /// Business code, unique per company.
    pub code: ItemCode,
    /// Display name.
    pub name: String,
    /// Unit the material is stocked and priced in.
    pub unit: UnitOfMeasure,
    /// Current price of one `unit`.
    pub unit_price: Decimal,
    /// When the material was created.
    pub created_at: DateTime<Utc>,
    /// When the material was last updated.
    pub updated_at: DateTime<Utc>,
}

/// One entry of the append-only price history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChange {
    /// Unique entry ID.
    pub id: PriceChangeId,
    /// Material whose price changed.
    pub raw_material_id: RawMaterialId,
    /// New price.
    pub price: Decimal,
    /// Why the price changed.
    pub justification: String,
    /// When the change happened.
    pub changed_at: DateTime<Utc>,
}

/// A raw material with its full price history, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMaterialWithHistory {
    /// The material itself.
    #[serde(flatten)]
    pub material: RawMaterial,
    /// Price history entries, oldest first.
    pub price_history: Vec<PriceChange>,
}

/// Input for creating a raw material.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRawMaterialInput {
    /// Business code.
    pub code: ItemCode,
    /// Display name.
    pub name: String,
    /// Stock / pricing unit.
    pub unit: UnitOfMeasure,
    /// Initial price of one `unit`.
    pub unit_price: Decimal,
}

/// Input for updating a raw material's descriptive fields.
///
/// The price is absent: it only changes through [`ChangePriceInput`]
/// so that every change lands in the history.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRawMaterialInput {
    /// New business code.
    pub code: Option<ItemCode>,
    /// New display name.
    pub name: Option<String>,
    /// New unit.
    pub unit: Option<UnitOfMeasure>,
}

/// Input for changing a raw material's price.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePriceInput {
    /// New price of one unit.
    pub price: Decimal,
    /// Why the price changed (required).
    pub justification: String,
}

impl ChangePriceInput {
    /// Check the input before it reaches the database.
    ///
    /// # Errors
    ///
    /// Returns a message when the price is negative or the justification is blank.
    pub fn validate(&self) -> Result<(), String> {
        if self.price < Decimal::ZERO {
            return Err("price cannot be negative".to_string());
        }
        if self.justification.trim().is_empty() {
            return Err("a justification is required to change a price".to_string());
        }
        Ok(())
    }
}

/// Filter criteria for listing raw materials.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMaterialFilter {
    /// Search in code and name.
    pub q: Option<String>,
    /// Maximum number of results.
    pub limit: Option<i64>,
    /// Number of results to skip.
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_change_price_requires_justification() {
        let input = ChangePriceInput {
            price: dec!(1.10),
            justification: "   ".to_string(),
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_change_price_rejects_negative_price() {
        let input = ChangePriceInput {
            price: dec!(-0.01),
            justification: "supplier credit".to_string(),
        };
        assert_eq!(input.validate(), Err("price cannot be negative".to_string()));
    }

    #[test]
    fn test_change_price_accepts_valid_input() {
        let input = ChangePriceInput {
            price: dec!(0),
            justification: "free sample batch".to_string(),
        };
        assert!(input.validate().is_ok());
    }
}
