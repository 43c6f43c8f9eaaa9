//! Production sheet API handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tracing::{info, instrument};

use bakery_core::{ProductionSheetId, SheetTotals, evaluate_sheet};

use crate::db::ProductionSheetRepository;
use crate::error::AppError;
use crate::middleware::{CompanyScope, Operator};
use crate::models::production::{
    CreateProductionSheetInput, ProductionSheet, ProductionSheetFilter, ProductionSheetSummary,
    TotalsRequest,
};
use crate::state::AppState;

/// Build the production sheets router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/production-sheets/totals", post(totals))
        .route("/api/production-sheets", get(list).post(create))
        .route("/api/production-sheets/{id}", get(show).delete(remove))
}

/// Live calculator: validate the lines and return the totals.
///
/// Called on every change of the sheet form; nothing is stored.
#[instrument(skip(request), fields(materials = request.materials.len(), products = request.products.len()))]
pub async fn totals(
    CompanyScope(_company_id): CompanyScope,
    Json(request): Json<TotalsRequest>,
) -> Result<Json<SheetTotals>, AppError> {
    let totals = evaluate_sheet(&request.materials, &request.products)?;
    Ok(Json(totals))
}

/// List sheets, newest production date first.
#[instrument(skip(state))]
async fn list(
    CompanyScope(company_id): CompanyScope,
    State(state): State<AppState>,
    Query(filter): Query<ProductionSheetFilter>,
) -> Result<Json<Vec<ProductionSheetSummary>>, AppError> {
    let sheets = ProductionSheetRepository::new(state.pool())
        .list(company_id, &filter)
        .await?;
    Ok(Json(sheets))
}

/// Save a sheet and add the produced quantities to stock.
#[instrument(skip(state, input))]
async fn create(
    CompanyScope(company_id): CompanyScope,
    Operator(operator): Operator,
    State(state): State<AppState>,
    Json(input): Json<CreateProductionSheetInput>,
) -> Result<impl IntoResponse, AppError> {
    let sheet = ProductionSheetRepository::new(state.pool())
        .create(company_id, &operator, &input)
        .await?;
    state.catalogue().invalidate(company_id).await;

    info!(
        sheet_id = %sheet.id,
        production_date = %sheet.production_date,
        profitability_rate = %sheet.totals.profitability_rate,
        "Production sheet saved"
    );
    Ok((StatusCode::CREATED, Json(sheet)))
}

/// One sheet with its lines.
#[instrument(skip(state))]
async fn show(
    CompanyScope(company_id): CompanyScope,
    State(state): State<AppState>,
    Path(id): Path<ProductionSheetId>,
) -> Result<Json<ProductionSheet>, AppError> {
    ProductionSheetRepository::new(state.pool())
        .get(company_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("production sheet {id}")))
}

/// Delete a sheet and take its produced quantities back out of stock.
#[instrument(skip(state))]
async fn remove(
    CompanyScope(company_id): CompanyScope,
    Operator(operator): Operator,
    State(state): State<AppState>,
    Path(id): Path<ProductionSheetId>,
) -> Result<StatusCode, AppError> {
    let deleted = ProductionSheetRepository::new(state.pool())
        .delete(company_id, id)
        .await?;
    if !deleted {
        return Err(AppError::NotFound(format!("production sheet {id}")));
    }

    state.catalogue().invalidate(company_id).await;
    info!(sheet_id = %id, operator = %operator, "Production sheet deleted");
    Ok(StatusCode::NO_CONTENT)
}
