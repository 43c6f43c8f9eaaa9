//! Seed a company's raw materials and products from a YAML file.
//!
//! ```yaml
//! raw_materials:
//!   - code: FLOUR-T65
//!     name: Flour T65
//!     unit: kg
//!     unit_price: "0.85"
//! products:
//!   - code: BAGUETTE
//!     name: Baguette
//!     unit_price: "1.20"
//!     weight_per_unit: "0.25"
//! ```
//!
//! Records whose code already exists in the company are skipped, so the
//! same file can be loaded twice.

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, warn};

use bakery_admin::config::BakeryConfig;
use bakery_admin::db::{self, ProductRepository, RawMaterialRepository, RepositoryError};
use bakery_admin::models::product::CreateProductInput;
use bakery_admin::models::raw_material::CreateRawMaterialInput;
use bakery_core::CompanyId;

use super::CommandError;

/// Contents of a seed file.
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub raw_materials: Vec<CreateRawMaterialInput>,
    #[serde(default)]
    pub products: Vec<CreateProductInput>,
}

/// Counts reported once seeding is done.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Check a seed file before anything touches the database.
///
/// Returns one message per problem; an empty list means the file is usable.
#[must_use]
pub fn validate(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();

    let mut codes = HashSet::new();
    for material in &seed.raw_materials {
        if material.name.trim().is_empty() {
            errors.push(format!("raw material {}: name is required", material.code));
        }
        if material.unit_price < Decimal::ZERO {
            errors.push(format!("raw material {}: negative price", material.code));
        }
        if !codes.insert(&material.code) {
            errors.push(format!("raw material {}: duplicate code", material.code));
        }
    }

    let mut codes = HashSet::new();
    for product in &seed.products {
        if product.name.trim().is_empty() {
            errors.push(format!("product {}: name is required", product.code));
        }
        if product.unit_price < Decimal::ZERO || product.weight_per_unit < Decimal::ZERO {
            errors.push(format!("product {}: negative price or weight", product.code));
        }
        if !codes.insert(&product.code) {
            errors.push(format!("product {}: duplicate code", product.code));
        }
    }

    errors
}

/// Load a seed file into the remote store for one company.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation, the
/// configuration is incomplete, or an insert fails for a reason other than
/// an existing code.
pub async fn run(path: &Path, company_id: CompanyId) -> Result<SeedSummary, CommandError> {
    info!(path = %path.display(), %company_id, "Loading seed file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;
    info!(
        raw_materials = seed.raw_materials.len(),
        products = seed.products.len(),
        "Parsed seed file"
    );

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(CommandError::InvalidSeed(errors.len()));
    }

    let config = BakeryConfig::from_env()?;
    let pool = db::create_pool(&config.database_url)?;

    let mut summary = SeedSummary::default();

    let materials = RawMaterialRepository::new(&pool);
    for input in &seed.raw_materials {
        let outcome = materials.create(company_id, input).await.map(|_| ());
        tally(&mut summary, "raw material", input.code.as_str(), outcome)?;
    }

    let products = ProductRepository::new(&pool);
    for input in &seed.products {
        let outcome = products.create(company_id, input).await.map(|_| ());
        tally(&mut summary, "product", input.code.as_str(), outcome)?;
    }

    info!("Seeding complete!");
    info!("  Records inserted: {}", summary.inserted);
    info!("  Records skipped (already exist): {}", summary.skipped);
    Ok(summary)
}

fn tally(
    summary: &mut SeedSummary,
    kind: &str,
    code: &str,
    outcome: Result<(), RepositoryError>,
) -> Result<(), CommandError> {
    match outcome {
        Ok(()) => summary.inserted += 1,
        Err(RepositoryError::Conflict(_)) => {
            warn!(kind, code, "Already exists, skipping");
            summary.skipped += 1;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
