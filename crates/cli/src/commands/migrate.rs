//! Remote store migrations.
//!
//! # Usage
//!
//! ```bash
//! bakery-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `BAKERY_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! Migrations live in `crates/admin/migrations/remote/`. The offline cache
//! migrates itself whenever it is opened.

use tracing::info;

use bakery_admin::config::BakeryConfig;
use bakery_admin::db;

use super::CommandError;

/// Run the remote store migrations.
///
/// # Errors
///
/// Returns an error if the configuration is incomplete, the database is
/// unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let config = BakeryConfig::from_env()?;

    info!("Connecting to remote store...");
    let pool = db::create_pool(&config.database_url)?;

    info!("Running remote store migrations...");
    sqlx::migrate!("../admin/migrations/remote").run(&pool).await?;

    info!("Remote store migrations complete!");
    Ok(())
}
