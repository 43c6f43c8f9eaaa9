//! Database operations for the bakery remote store (`PostgreSQL`).
//!
//! # Schema: `bakery`
//!
//! ## Tables
//!
//! - `raw_materials` - Raw material catalogue with current price
//! - `raw_material_price_history` - Append-only price log
//! - `products` - Finished products with stock
//! - `production_sheets` - Production runs with derived totals
//! - `production_sheet_materials` / `production_sheet_products` - Sheet lines
//! - `waste_records` - Waste entries, last-write-wins on `updated_at`
//!
//! Every table carries a `company_id`; every query is scoped by it.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/admin/migrations/remote/` and run via:
//! ```bash
//! cargo run -p bakery-cli -- migrate
//! ```

pub mod production_sheets;
pub mod products;
pub mod raw_materials;
pub mod waste;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use production_sheets::ProductionSheetRepository;
pub use products::ProductRepository;
pub use raw_materials::RawMaterialRepository;
pub use waste::{UpsertOutcome, WasteRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate code).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Input rejected before it reached the database.
    #[error("validation failed: {0}")]
    Validation(String),
}

impl RepositoryError {
    /// `true` when the remote store could not be reached at all, as opposed
    /// to a query that ran and failed.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Database(
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            )
        )
    }
}

/// Map a unique-constraint violation to [`RepositoryError::Conflict`].
pub(crate) fn map_unique_violation(err: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_string());
    }
    RepositoryError::Database(err)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// Connections are opened lazily so the server starts (and serves the
/// offline cache) while the database is unreachable.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection string cannot be parsed.
pub fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(database_url.expose_secret())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_errors() {
        assert!(RepositoryError::Database(sqlx::Error::PoolTimedOut).is_unavailable());
        assert!(RepositoryError::Database(sqlx::Error::PoolClosed).is_unavailable());
        assert!(!RepositoryError::Database(sqlx::Error::RowNotFound).is_unavailable());
        assert!(!RepositoryError::NotFound.is_unavailable());
    }
}
