//! HTTP middleware and request extractors.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Scope extractors (company and operator, per handler)

pub mod operator;

pub use operator::{CompanyScope, Operator, ScopeRejection};
