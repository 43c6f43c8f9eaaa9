//! Bakery back-office CLI - migrations, seeding and offline sync.
//!
//! # Usage
//!
//! ```bash
//! # Run the remote store migrations
//! bakery-cli migrate
//!
//! # Load raw materials and products for company 1
//! bakery-cli seed seed/bakery.yaml --company 1
//!
//! # Push unsynced waste records and refresh the offline cache
//! bakery-cli sync --company 1
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run remote store migrations
//! - `seed` - Load raw materials and products from YAML
//! - `sync` - Reconcile the offline cache with the remote store

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use bakery_core::CompanyId;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bakery-cli")]
#[command(author, version, about = "Bakery back-office CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run remote store migrations
    Migrate,
    /// Load raw materials and products from a YAML file
    Seed {
        /// Path of the seed file
        file: PathBuf,

        /// Company the records belong to
        #[arg(short, long)]
        company: i32,
    },
    /// Push unsynced waste records and refresh the offline cache
    Sync {
        /// Company to reconcile
        #[arg(short, long)]
        company: i32,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file, company } => {
            commands::seed::run(&file, CompanyId::new(company)).await?;
        }
        Commands::Sync { company } => {
            commands::sync::run(CompanyId::new(company)).await?;
        }
    }
    Ok(())
}
