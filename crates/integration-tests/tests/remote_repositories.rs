//! Integration tests for the `PostgreSQL` repositories.
//!
//! These tests require:
//! - A scratch `PostgreSQL` database in `BAKERY_TEST_DATABASE_URL`
//!
//! Run with: cargo test -p bakery-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::PgPool;

use bakery_admin::db::{
    ProductRepository, ProductionSheetRepository, RawMaterialRepository, RepositoryError,
    UpsertOutcome, WasteRepository,
};
use bakery_admin::models::product::{CreateProductInput, Product, StockAdjustment};
use bakery_admin::models::production::{
    CreateProductionSheetInput, MaterialLineInput, ProductLineInput,
};
use bakery_admin::models::raw_material::{ChangePriceInput, CreateRawMaterialInput, RawMaterial};
use bakery_admin::models::waste::{CreateWasteInput, WasteRecord};
use bakery_core::{CompanyId, ItemCode, ProductId, UnitOfMeasure, WasteReason};
use bakery_integration_tests::{fresh_company, test_pool};

// ============================================================================
// Helpers
// ============================================================================

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, hour, 0, 0).unwrap()
}

async fn create_product(pool: &PgPool, company: CompanyId, code: &str, stock: Decimal) -> Product {
    ProductRepository::new(pool)
        .create(
            company,
            &CreateProductInput {
                code: ItemCode::parse(code).unwrap(),
                name: format!("Product {code}"),
                unit_price: dec!(1.20),
                weight_per_unit: dec!(0.25),
                stock_quantity: Some(stock),
            },
        )
        .await
        .expect("Failed to create product")
}

async fn create_flour(pool: &PgPool, company: CompanyId) -> RawMaterial {
    RawMaterialRepository::new(pool)
        .create(
            company,
            &CreateRawMaterialInput {
                code: ItemCode::parse("FLOUR-T65").unwrap(),
                name: "Flour T65".to_string(),
                unit: UnitOfMeasure::Kilogram,
                unit_price: dec!(0.85),
            },
        )
        .await
        .expect("Failed to create raw material")
}

async fn stock(pool: &PgPool, company: CompanyId, id: ProductId) -> Decimal {
    ProductRepository::new(pool)
        .get(company, id)
        .await
        .unwrap()
        .expect("Product should exist")
        .stock_quantity
}

fn waste(company: CompanyId, product: ProductId, quantity: Decimal, now: DateTime<Utc>) -> WasteRecord {
    let input = CreateWasteInput {
        id: None,
        product_id: product,
        quantity,
        reason: WasteReason::Expired,
        recorded_at: None,
    };
    WasteRecord::new(company, "lucie", &input, now).unwrap()
}

// ============================================================================
// Stock Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires a PostgreSQL database in BAKERY_TEST_DATABASE_URL"]
async fn test_adjust_stock_is_all_or_nothing() {
    let pool = test_pool().await;
    let company = fresh_company();
    let baguette = create_product(&pool, company, "BAGUETTE", dec!(10)).await;

    let err = ProductRepository::new(&pool)
        .adjust_stock(
            company,
            &[
                StockAdjustment {
                    product_id: baguette.id,
                    delta: dec!(5),
                },
                StockAdjustment {
                    product_id: ProductId::new(i32::MAX),
                    delta: dec!(-1),
                },
            ],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RepositoryError::NotFound));
    assert_eq!(stock(&pool, company, baguette.id).await, dec!(10));

    ProductRepository::new(&pool)
        .adjust_stock(
            company,
            &[StockAdjustment {
                product_id: baguette.id,
                delta: dec!(-2.5),
            }],
        )
        .await
        .unwrap();
    assert_eq!(stock(&pool, company, baguette.id).await, dec!(7.5));
}

// ============================================================================
// Waste Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires a PostgreSQL database in BAKERY_TEST_DATABASE_URL"]
async fn test_waste_upsert_moves_stock_by_difference() {
    let pool = test_pool().await;
    let company = fresh_company();
    let baguette = create_product(&pool, company, "BAGUETTE", dec!(20)).await;
    let repo = WasteRepository::new(&pool);

    let record = waste(company, baguette.id, dec!(3), at(8));
    assert_eq!(repo.upsert(&record).await.unwrap(), UpsertOutcome::Inserted);
    assert_eq!(stock(&pool, company, baguette.id).await, dec!(17));

    let mut edited = record.clone();
    edited.quantity = dec!(5);
    edited.updated_at = at(9);
    assert_eq!(repo.upsert(&edited).await.unwrap(), UpsertOutcome::Updated);
    assert_eq!(stock(&pool, company, baguette.id).await, dec!(15));

    // The 08:00 version lost to the 09:00 one.
    assert_eq!(repo.upsert(&record).await.unwrap(), UpsertOutcome::Stale);
    assert_eq!(stock(&pool, company, baguette.id).await, dec!(15));
    let stored = repo.get(company, record.id).await.unwrap().unwrap();
    assert_eq!(stored.quantity, dec!(5));
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database in BAKERY_TEST_DATABASE_URL"]
async fn test_waste_moved_to_another_product() {
    let pool = test_pool().await;
    let company = fresh_company();
    let baguette = create_product(&pool, company, "BAGUETTE", dec!(20)).await;
    let croissant = create_product(&pool, company, "CROISSANT", dec!(30)).await;
    let repo = WasteRepository::new(&pool);

    let record = waste(company, baguette.id, dec!(4), at(8));
    repo.upsert(&record).await.unwrap();

    let mut moved = record.clone();
    moved.product_id = croissant.id;
    moved.updated_at = at(9);
    repo.upsert(&moved).await.unwrap();

    assert_eq!(stock(&pool, company, baguette.id).await, dec!(20));
    assert_eq!(stock(&pool, company, croissant.id).await, dec!(26));
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database in BAKERY_TEST_DATABASE_URL"]
async fn test_concurrent_pushes_of_a_new_record_take_stock_once() {
    let pool = test_pool().await;
    let company = fresh_company();
    let baguette = create_product(&pool, company, "BAGUETTE", dec!(20)).await;
    let record = waste(company, baguette.id, dec!(3), at(8));

    let first = WasteRepository::new(&pool);
    let second = WasteRepository::new(&pool);
    let (a, b) = tokio::join!(first.upsert(&record), second.upsert(&record));

    let mut outcomes = [a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| *o != UpsertOutcome::Inserted);
    assert_eq!(outcomes, [UpsertOutcome::Inserted, UpsertOutcome::Updated]);
    assert_eq!(stock(&pool, company, baguette.id).await, dec!(17));
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database in BAKERY_TEST_DATABASE_URL"]
async fn test_waste_id_of_another_company_conflicts() {
    let pool = test_pool().await;
    let company = fresh_company();
    let other = fresh_company();
    let baguette = create_product(&pool, company, "BAGUETTE", dec!(20)).await;
    let repo = WasteRepository::new(&pool);

    let record = waste(company, baguette.id, dec!(1), at(8));
    repo.upsert(&record).await.unwrap();

    let mut stolen = record.clone();
    stolen.company_id = other;
    stolen.updated_at = at(9);
    assert!(matches!(
        repo.upsert(&stolen).await,
        Err(RepositoryError::Conflict(_))
    ));
    assert_eq!(stock(&pool, company, baguette.id).await, dec!(19));
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database in BAKERY_TEST_DATABASE_URL"]
async fn test_deleting_waste_restores_stock() {
    let pool = test_pool().await;
    let company = fresh_company();
    let baguette = create_product(&pool, company, "BAGUETTE", dec!(20)).await;
    let repo = WasteRepository::new(&pool);

    let record = waste(company, baguette.id, dec!(6), at(8));
    repo.upsert(&record).await.unwrap();
    assert_eq!(stock(&pool, company, baguette.id).await, dec!(14));

    assert!(repo.delete(company, record.id).await.unwrap());
    assert_eq!(stock(&pool, company, baguette.id).await, dec!(20));
    assert!(!repo.delete(company, record.id).await.unwrap());
}

// ============================================================================
// Raw Material Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires a PostgreSQL database in BAKERY_TEST_DATABASE_URL"]
async fn test_change_price_appends_history() {
    let pool = test_pool().await;
    let company = fresh_company();
    let flour = create_flour(&pool, company).await;
    let repo = RawMaterialRepository::new(&pool);

    let updated = repo
        .change_price(
            company,
            flour.id,
            &ChangePriceInput {
                price: dec!(0.92),
                justification: "Mill surcharge".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.material.unit_price, dec!(0.92));
    let prices: Vec<Decimal> = updated.price_history.iter().map(|c| c.price).collect();
    assert_eq!(prices, vec![dec!(0.85), dec!(0.92)]);
    assert_eq!(
        updated.price_history.last().unwrap().justification,
        "Mill surcharge"
    );

    let err = repo
        .change_price(
            company,
            flour.id,
            &ChangePriceInput {
                price: dec!(1),
                justification: "  ".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Validation(_)));
    let reread = repo.get_with_history(company, flour.id).await.unwrap();
    assert_eq!(reread.price_history.len(), 2);
}

// ============================================================================
// Production Sheet Tests
// ============================================================================

fn sheet_input(
    flour: &RawMaterial,
    product: &Product,
    material_quantity: Decimal,
    produced: Decimal,
) -> CreateProductionSheetInput {
    CreateProductionSheetInput {
        production_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
        responsible: Some("Marie".to_string()),
        notes: None,
        materials: vec![MaterialLineInput {
            raw_material_id: flour.id,
            quantity: material_quantity,
            unit_price: None,
            unit: None,
        }],
        products: vec![ProductLineInput {
            product_id: product.id,
            quantity: produced,
            unit_price: None,
            weight_per_unit: None,
        }],
    }
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database in BAKERY_TEST_DATABASE_URL"]
async fn test_deleting_sheet_reverses_stock() {
    let pool = test_pool().await;
    let company = fresh_company();
    let flour = create_flour(&pool, company).await;
    let baguette = create_product(&pool, company, "BAGUETTE", dec!(5)).await;
    let repo = ProductionSheetRepository::new(&pool);

    let sheet = repo
        .create(company, "marie", &sheet_input(&flour, &baguette, dec!(25), dec!(150)))
        .await
        .unwrap();
    // 25 kg at 0.85, 150 baguettes at 1.20
    assert_eq!(sheet.totals.material_cost, dec!(21.25));
    assert_eq!(sheet.totals.production_amount, dec!(180));
    assert_eq!(stock(&pool, company, baguette.id).await, dec!(155));

    let stored = repo.get(company, sheet.id).await.unwrap().unwrap();
    assert_eq!(stored.totals, sheet.totals);

    assert!(repo.delete(company, sheet.id).await.unwrap());
    assert_eq!(stock(&pool, company, baguette.id).await, dec!(5));
    assert!(repo.get(company, sheet.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database in BAKERY_TEST_DATABASE_URL"]
async fn test_rejected_sheet_leaves_stock_alone() {
    let pool = test_pool().await;
    let company = fresh_company();
    let flour = create_flour(&pool, company).await;
    let baguette = create_product(&pool, company, "BAGUETTE", dec!(5)).await;

    let err = ProductionSheetRepository::new(&pool)
        .create(company, "marie", &sheet_input(&flour, &baguette, dec!(25), dec!(0)))
        .await
        .unwrap_err();

    assert!(matches!(err, RepositoryError::Validation(_)));
    assert_eq!(stock(&pool, company, baguette.id).await, dec!(5));
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database in BAKERY_TEST_DATABASE_URL"]
async fn test_widest_accepted_sheet_is_stored() {
    let pool = test_pool().await;
    let company = fresh_company();
    let flour = create_flour(&pool, company).await;
    let baguette = create_product(&pool, company, "BAGUETTE", dec!(0)).await;

    let mut input = sheet_input(&flour, &baguette, dec!(10000000), dec!(1));
    input.materials[0].unit_price = Some(dec!(10000000));
    input.products[0].unit_price = Some(dec!(0.01));

    let sheet = ProductionSheetRepository::new(&pool)
        .create(company, "marie", &input)
        .await
        .unwrap();

    assert_eq!(sheet.totals.material_cost, dec!(100000000000000));
    assert_eq!(sheet.totals.profitability_rate, dec!(-999999999999999900));

    let stored = ProductionSheetRepository::new(&pool)
        .get(company, sheet.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.totals, sheet.totals);
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database in BAKERY_TEST_DATABASE_URL"]
async fn test_waste_edits_keep_four_decimals() {
    let pool = test_pool().await;
    let company = fresh_company();
    let baguette = create_product(&pool, company, "BAGUETTE", dec!(1)).await;
    let repo = WasteRepository::new(&pool);

    let record = waste(company, baguette.id, dec!(0.1234), at(8));
    repo.upsert(&record).await.unwrap();

    let stored = repo.get(company, record.id).await.unwrap().unwrap();
    assert_eq!(stored.quantity, dec!(0.1234));
    assert_eq!(stock(&pool, company, baguette.id).await, dec!(0.8766));

    let mut later = record.clone();
    later.updated_at = record.updated_at + Duration::minutes(1);
    later.quantity = dec!(0.5);
    repo.upsert(&later).await.unwrap();
    assert_eq!(stock(&pool, company, baguette.id).await, dec!(0.5));
}
