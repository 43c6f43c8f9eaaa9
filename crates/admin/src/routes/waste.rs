//! Waste API handlers.
//!
//! Entries are offline-first: when the remote store is unreachable the
//! record is kept in the offline cache and the request answers
//! `202 Accepted` with `"synced": false`.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::Utc;
use tracing::{info, instrument};

use bakery_core::WasteRecordId;

use crate::error::AppError;
use crate::middleware::{CompanyScope, Operator};
use crate::models::waste::{CreateWasteInput, WasteFilter};
use crate::offline::sync::{PgWasteRemote, SyncReport};
use crate::services::{WasteListing, WasteService};
use crate::state::AppState;

/// Build the waste router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/waste", get(list).post(record))
        .route("/api/waste/sync", post(sync))
        .route("/api/waste/{id}", delete(remove))
}

fn service(state: &AppState) -> WasteService<'_, PgWasteRemote> {
    WasteService::new(state.remote(), state.offline(), state.catalogue())
}

/// List waste records, including entries not pushed yet.
#[instrument(skip(state))]
async fn list(
    CompanyScope(company_id): CompanyScope,
    State(state): State<AppState>,
    Query(filter): Query<WasteFilter>,
) -> Result<Json<WasteListing>, AppError> {
    let listing = service(&state).list(company_id, &filter).await?;
    Ok(Json(listing))
}

/// Record waste.
#[instrument(skip(state, input))]
async fn record(
    CompanyScope(company_id): CompanyScope,
    Operator(operator): Operator,
    State(state): State<AppState>,
    Json(input): Json<CreateWasteInput>,
) -> Result<impl IntoResponse, AppError> {
    let result = service(&state)
        .record(company_id, &operator, &input, Utc::now())
        .await?;

    let status = if result.synced {
        StatusCode::CREATED
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(result)))
}

/// Delete a waste record and give its quantity back to stock.
#[instrument(skip(state))]
async fn remove(
    CompanyScope(company_id): CompanyScope,
    Operator(operator): Operator,
    State(state): State<AppState>,
    Path(id): Path<WasteRecordId>,
) -> Result<StatusCode, AppError> {
    if service(&state).delete(company_id, id).await? {
        info!(waste_id = %id, operator = %operator, "Waste record deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("waste record {id}")))
    }
}

/// Push unsynced entries and refresh the offline cache.
#[instrument(skip(state))]
async fn sync(
    CompanyScope(company_id): CompanyScope,
    Operator(operator): Operator,
    State(state): State<AppState>,
) -> Result<Json<SyncReport>, AppError> {
    let report = service(&state).sync(company_id).await?;
    info!(
        operator = %operator,
        deleted = report.deleted,
        pushed = report.pushed,
        failed = report.failed,
        "Waste sync requested"
    );
    Ok(Json(report))
}
