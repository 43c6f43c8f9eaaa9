//! Business logic services for the back-office.
//!
//! # Services
//!
//! - `waste` - Offline-first waste entry over the remote store and the offline cache

pub mod waste;

pub use waste::{WasteError, WasteListing, WasteService};
