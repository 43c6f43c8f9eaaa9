//! Reconcile the offline cache with the remote store.
//!
//! Same pass as `POST /api/waste/sync`, for a terminal that was offline
//! when the back-office server stopped.
//!
//! # Environment Variables
//!
//! - `BAKERY_DATABASE_URL` - `PostgreSQL` connection string
//! - `BAKERY_OFFLINE_DB` - Offline cache file (default: bakery-offline.db)

use tracing::{info, warn};

use bakery_admin::config::BakeryConfig;
use bakery_admin::db;
use bakery_admin::offline::OfflineStore;
use bakery_admin::offline::sync::{PgWasteRemote, Reconciler, SyncReport};
use bakery_core::CompanyId;

use super::CommandError;

/// Push unsynced waste records, then refresh the cache for one company.
///
/// # Errors
///
/// Returns an error if the configuration is incomplete, the offline cache
/// cannot be opened, or the remote store is unreachable.
pub async fn run(company_id: CompanyId) -> Result<SyncReport, CommandError> {
    let config = BakeryConfig::from_env()?;
    let pool = db::create_pool(&config.database_url)?;
    let store = OfflineStore::open(&config.offline_db_path).await?;
    let remote = PgWasteRemote::new(pool);

    info!(%company_id, path = %config.offline_db_path.display(), "Reconciling offline cache");
    let report = Reconciler::new(&store, &remote).run(company_id).await?;

    info!("Sync complete!");
    info!("  Waste deletions pushed: {}", report.deleted);
    info!("  Waste records pushed: {}", report.pushed);
    info!("  Waste records pulled: {}", report.pulled_waste);
    info!("  Products mirrored: {}", report.pulled_products);
    if report.failed > 0 {
        warn!(failed = report.failed, "Some records or deletions are still unsynced");
    }
    Ok(report)
}
