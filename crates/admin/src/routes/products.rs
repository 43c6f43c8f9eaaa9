//! Product API handlers.
//!
//! Listings go through the cached catalogue; every write drops the company's
//! cached list.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use tracing::{info, instrument};

use bakery_core::ProductId;

use crate::catalogue::CatalogueSource;
use crate::db::ProductRepository;
use crate::error::AppError;
use crate::middleware::{CompanyScope, Operator};
use crate::models::product::{CreateProductInput, Product, UpdateProductInput};
use crate::state::AppState;

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list).post(create))
        .route("/api/products/{id}", get(show).put(update).delete(remove))
}

/// Product list response.
#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<Product>,
    /// `offline` when the remote store was unreachable and the mirror answered.
    pub source: CatalogueSource,
}

/// List products, ordered by name.
#[instrument(skip(state))]
async fn list(
    CompanyScope(company_id): CompanyScope,
    State(state): State<AppState>,
) -> Result<Json<ProductListResponse>, AppError> {
    let view = state
        .catalogue()
        .products(state.remote(), state.offline(), company_id)
        .await?;

    Ok(Json(ProductListResponse {
        products: view.products.as_ref().clone(),
        source: view.source,
    }))
}

/// Create a product.
#[instrument(skip(state, input))]
async fn create(
    CompanyScope(company_id): CompanyScope,
    Operator(operator): Operator,
    State(state): State<AppState>,
    Json(input): Json<CreateProductInput>,
) -> Result<impl IntoResponse, AppError> {
    let product = ProductRepository::new(state.pool())
        .create(company_id, &input)
        .await?;
    state.catalogue().invalidate(company_id).await;

    info!(
        product_id = %product.id,
        code = %product.code,
        operator = %operator,
        "Product created"
    );
    Ok((StatusCode::CREATED, Json(product)))
}

/// One product, read from the remote store.
#[instrument(skip(state))]
async fn show(
    CompanyScope(company_id): CompanyScope,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    ProductRepository::new(state.pool())
        .get(company_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// Update a product's code, name, price or unit weight.
#[instrument(skip(state, input))]
async fn update(
    CompanyScope(company_id): CompanyScope,
    Operator(operator): Operator,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(input): Json<UpdateProductInput>,
) -> Result<Json<Product>, AppError> {
    let product = ProductRepository::new(state.pool())
        .update(company_id, id, &input)
        .await?;
    state.catalogue().invalidate(company_id).await;

    info!(product_id = %id, operator = %operator, "Product updated");
    Ok(Json(product))
}

/// Delete a product.
#[instrument(skip(state))]
async fn remove(
    CompanyScope(company_id): CompanyScope,
    Operator(operator): Operator,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    let deleted = ProductRepository::new(state.pool())
        .delete(company_id, id)
        .await?;
    if !deleted {
        return Err(AppError::NotFound(format!("product {id}")));
    }

    state.catalogue().invalidate(company_id).await;
    info!(product_id = %id, operator = %operator, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}
