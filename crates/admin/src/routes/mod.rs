//! HTTP route handlers for the back-office.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness check
//! GET  /health/ready                        - Readiness check (remote + offline store)
//!
//! # Raw materials
//! GET    /api/raw-materials                 - List (?q=&limit=&offset=)
//! POST   /api/raw-materials                 - Create
//! GET    /api/raw-materials/{id}            - Detail with price history
//! PUT    /api/raw-materials/{id}            - Update code, name, unit
//! POST   /api/raw-materials/{id}/price      - Change price (justification required)
//! DELETE /api/raw-materials/{id}            - Delete
//!
//! # Products
//! GET    /api/products                      - List (cached, offline fallback)
//! POST   /api/products                      - Create
//! GET    /api/products/{id}                 - Detail
//! PUT    /api/products/{id}                 - Update
//! DELETE /api/products/{id}                 - Delete
//!
//! # Production sheets
//! POST   /api/production-sheets/totals      - Live calculator, nothing stored
//! GET    /api/production-sheets             - List (?from=&to=)
//! POST   /api/production-sheets             - Create, adds produced stock
//! GET    /api/production-sheets/{id}        - Detail with lines
//! DELETE /api/production-sheets/{id}        - Delete, removes produced stock
//!
//! # Waste
//! GET    /api/waste                         - List (?from=&to=&reason=&limit=)
//! POST   /api/waste                         - Record (201 synced, 202 kept offline)
//! DELETE /api/waste/{id}                    - Delete, restores stock
//! POST   /api/waste/sync                    - Reconcile the offline cache
//!
//! # Print (HTML)
//! GET    /production-sheets/{id}/print      - Production sheet document
//! GET    /waste/print                       - Waste report (?from=&to=&reason=)
//! ```
//!
//! Every route except the health checks needs the `X-Company-Id` header (or a
//! `company` query parameter); writes also need `X-Operator`.

pub mod print;
pub mod production;
pub mod products;
pub mod raw_materials;
pub mod waste;

use axum::Router;

use crate::state::AppState;

/// Build the application router, without health checks and layers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(raw_materials::router())
        .merge(products::router())
        .merge(production::router())
        .merge(waste::router())
        .merge(print::router())
}
