//! Printable HTML documents.
//!
//! Pages are opened in a new tab, so the company can also come from the
//! `company` query parameter.

use askama::Template;
use axum::{
    Router,
    extract::{Path, Query, State},
    response::Html,
    routing::get,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::instrument;

use bakery_core::{ProductionSheetId, WasteReason};

use crate::db::ProductionSheetRepository;
use crate::error::AppError;
use crate::middleware::CompanyScope;
use crate::models::waste::WasteFilter;
use crate::print::{
    DateRange, PrintDocument, PrintTemplate, production_sheet_document, waste_report_document,
};
use crate::services::WasteService;
use crate::state::AppState;

/// Build the print router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/production-sheets/{id}/print", get(production_sheet))
        .route("/waste/print", get(waste_report))
}

/// Query params for the waste report.
#[derive(Debug, Deserialize)]
pub struct WasteReportQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub reason: Option<WasteReason>,
}

fn render(doc: PrintDocument) -> Html<String> {
    Html(PrintTemplate { doc }.render().unwrap_or_else(|e| {
        tracing::error!("Template render error: {}", e);
        "Internal Server Error".to_string()
    }))
}

/// Print a production sheet.
#[instrument(skip(state))]
async fn production_sheet(
    CompanyScope(company_id): CompanyScope,
    State(state): State<AppState>,
    Path(id): Path<ProductionSheetId>,
) -> Result<Html<String>, AppError> {
    let sheet = ProductionSheetRepository::new(state.pool())
        .get(company_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("production sheet {id}")))?;

    Ok(render(production_sheet_document(&sheet, Utc::now())))
}

/// Print the waste report for a period.
///
/// Works offline: records and prices then come from the offline cache.
#[instrument(skip(state))]
async fn waste_report(
    CompanyScope(company_id): CompanyScope,
    State(state): State<AppState>,
    Query(query): Query<WasteReportQuery>,
) -> Result<Html<String>, AppError> {
    let filter = WasteFilter {
        from: query.from,
        to: query.to,
        reason: query.reason,
        limit: None,
    };
    let listing = WasteService::new(state.remote(), state.offline(), state.catalogue())
        .list(company_id, &filter)
        .await?;
    let catalogue = state
        .catalogue()
        .products(state.remote(), state.offline(), company_id)
        .await?;

    let range = DateRange {
        from: query.from,
        to: query.to,
    };
    Ok(render(waste_report_document(
        &listing.records,
        &catalogue.products,
        range,
        Utc::now(),
    )))
}
