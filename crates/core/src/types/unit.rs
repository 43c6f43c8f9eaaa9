//! Units of measure for raw materials.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Error returned when a unit string is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown unit of measure '{0}'")]
pub struct UnknownUnit(pub String);

/// Unit in which a raw material is stocked and priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitOfMeasure {
    #[default]
    #[serde(rename = "kg")]
    Kilogram,
    #[serde(rename = "g")]
    Gram,
    #[serde(rename = "l")]
    Litre,
    Piece,
}

impl UnitOfMeasure {
    /// Canonical short form, as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kilogram => "kg",
            Self::Gram => "g",
            Self::Litre => "l",
            Self::Piece => "piece",
        }
    }

    /// Quantity expressed in the unit used for weight aggregation.
    ///
    /// Grams are converted to kilograms; every other unit is taken as-is.
    #[must_use]
    pub fn to_aggregate_weight(self, quantity: Decimal) -> Decimal {
        match self {
            Self::Gram => quantity / Decimal::ONE_THOUSAND,
            Self::Kilogram | Self::Litre | Self::Piece => quantity,
        }
    }
}

impl fmt::Display for UnitOfMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UnitOfMeasure {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kg" | "kilogram" | "kilograms" => Ok(Self::Kilogram),
            "g" | "gram" | "grams" => Ok(Self::Gram),
            "l" | "litre" | "liter" | "litres" | "liters" => Ok(Self::Litre),
            "piece" | "pieces" | "pc" | "pcs" => Ok(Self::Piece),
            _ => Err(UnknownUnit(s.to_string())),
        }
    }
}
