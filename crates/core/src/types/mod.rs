//! Core types for the bakery back-office.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod code;
pub mod id;
pub mod unit;
pub mod waste;

pub use code::{ItemCode, ItemCodeError};
pub use id::*;
pub use unit::{UnitOfMeasure, UnknownUnit};
pub use waste::{SyncStatus, UnknownVariant, WasteReason};
