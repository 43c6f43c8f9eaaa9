//! Item code type shared by raw materials and products.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`ItemCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemCodeError {
    /// The input string is empty (after trimming).
    #[error("code cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("code must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `A-Z`, `0-9`, `-` and `_`.
    #[error("code contains invalid character '{0}'")]
    InvalidCharacter(char),
}

/// A short business code identifying a raw material or product (e.g. `FLOUR-T55`).
///
/// Codes are normalized to upper case and must be unique per company.
///
/// ## Constraints
///
/// - Length: 1-32 characters after trimming
/// - Characters: ASCII letters, digits, `-` and `_`
///
/// ## Examples
///
/// ```
/// use bakery_core::ItemCode;
///
/// let code = ItemCode::parse(" flour-t55 ").unwrap();
/// assert_eq!(code.as_str(), "FLOUR-T55");
///
/// assert!(ItemCode::parse("").is_err());
/// assert!(ItemCode::parse("no spaces").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct ItemCode(String);

impl ItemCode {
    /// Maximum length of a code.
    pub const MAX_LENGTH: usize = 32;

    /// Parse an `ItemCode` from a string, trimming and upper-casing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, longer than 32
    /// characters, or contains characters other than letters, digits,
    /// `-` and `_`.
    pub fn parse(s: &str) -> Result<Self, ItemCodeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ItemCodeError::Empty);
        }

        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(ItemCodeError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if let Some(c) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(ItemCodeError::InvalidCharacter(c));
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ItemCode` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ItemCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemCode {
    type Err = ItemCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ItemCode {
    type Error = ItemCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ItemCode> for String {
    fn from(code: ItemCode) -> Self {
        code.0
    }
}

impl AsRef<str> for ItemCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
