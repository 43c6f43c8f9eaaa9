//! CLI command implementations.

pub mod migrate;
pub mod seed;
pub mod sync;

use thiserror::Error;

use bakery_admin::config::ConfigError;
use bakery_admin::db::RepositoryError;
use bakery_admin::offline::OfflineError;
use bakery_admin::offline::sync::SyncError;

/// Errors that abort a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Seed file rejected: {0} validation errors")]
    InvalidSeed(usize),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Offline(#[from] OfflineError),

    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),
}
