//! Bakery Core - Shared types and the production-sheet calculator.
//!
//! This crate provides the pieces used across all bakery back-office components:
//! - `admin` - Back-office server (repositories, offline cache, print documents)
//! - `cli` - Command-line tools for migrations, seeding and offline sync
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere, including the live totals preview of the sheet form.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, codes, units and enums
//! - [`production`] - Production-sheet totals and line validation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod production;
pub mod types;

pub use production::{
    MaterialLine, ProductLine, ProductionError, SheetTotals, compute_totals, evaluate_sheet,
    validate_sheet,
};
pub use types::*;
