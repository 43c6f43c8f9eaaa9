//! Raw material API handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tracing::{info, instrument};

use bakery_core::RawMaterialId;

use crate::db::RawMaterialRepository;
use crate::error::AppError;
use crate::middleware::{CompanyScope, Operator};
use crate::models::raw_material::{
    ChangePriceInput, CreateRawMaterialInput, RawMaterial, RawMaterialFilter,
    RawMaterialWithHistory, UpdateRawMaterialInput,
};
use crate::state::AppState;

/// Build the raw materials router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/raw-materials", get(list).post(create))
        .route(
            "/api/raw-materials/{id}",
            get(show).put(update).delete(remove),
        )
        .route("/api/raw-materials/{id}/price", post(change_price))
}

/// List raw materials, optionally searching code and name.
#[instrument(skip(state))]
async fn list(
    CompanyScope(company_id): CompanyScope,
    State(state): State<AppState>,
    Query(filter): Query<RawMaterialFilter>,
) -> Result<Json<Vec<RawMaterial>>, AppError> {
    let materials = RawMaterialRepository::new(state.pool())
        .list(company_id, &filter)
        .await?;
    Ok(Json(materials))
}

/// Create a raw material; its opening price starts the history.
#[instrument(skip(state, input))]
async fn create(
    CompanyScope(company_id): CompanyScope,
    Operator(operator): Operator,
    State(state): State<AppState>,
    Json(input): Json<CreateRawMaterialInput>,
) -> Result<impl IntoResponse, AppError> {
    let material = RawMaterialRepository::new(state.pool())
        .create(company_id, &input)
        .await?;

    info!(
        raw_material_id = %material.id,
        code = %material.code,
        operator = %operator,
        "Raw material created"
    );
    Ok((StatusCode::CREATED, Json(material)))
}

/// Raw material with its price history, oldest change first.
#[instrument(skip(state))]
async fn show(
    CompanyScope(company_id): CompanyScope,
    State(state): State<AppState>,
    Path(id): Path<RawMaterialId>,
) -> Result<Json<RawMaterialWithHistory>, AppError> {
    let material = RawMaterialRepository::new(state.pool())
        .get_with_history(company_id, id)
        .await?;
    Ok(Json(material))
}

/// Update code, name or unit. Prices go through [`change_price`].
#[instrument(skip(state, input))]
async fn update(
    CompanyScope(company_id): CompanyScope,
    Operator(operator): Operator,
    State(state): State<AppState>,
    Path(id): Path<RawMaterialId>,
    Json(input): Json<UpdateRawMaterialInput>,
) -> Result<Json<RawMaterial>, AppError> {
    let material = RawMaterialRepository::new(state.pool())
        .update(company_id, id, &input)
        .await?;

    info!(raw_material_id = %id, operator = %operator, "Raw material updated");
    Ok(Json(material))
}

/// Change the current price and log the justification.
#[instrument(skip(state, input))]
async fn change_price(
    CompanyScope(company_id): CompanyScope,
    Operator(operator): Operator,
    State(state): State<AppState>,
    Path(id): Path<RawMaterialId>,
    Json(input): Json<ChangePriceInput>,
) -> Result<Json<RawMaterialWithHistory>, AppError> {
    let material = RawMaterialRepository::new(state.pool())
        .change_price(company_id, id, &input)
        .await?;

    info!(
        raw_material_id = %id,
        price = %input.price,
        operator = %operator,
        "Raw material price changed"
    );
    Ok(Json(material))
}

/// Delete a raw material.
#[instrument(skip(state))]
async fn remove(
    CompanyScope(company_id): CompanyScope,
    Operator(operator): Operator,
    State(state): State<AppState>,
    Path(id): Path<RawMaterialId>,
) -> Result<StatusCode, AppError> {
    if RawMaterialRepository::new(state.pool())
        .delete(company_id, id)
        .await?
    {
        info!(raw_material_id = %id, operator = %operator, "Raw material deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("raw material {id}")))
    }
}
