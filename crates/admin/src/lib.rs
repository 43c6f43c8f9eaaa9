//! Bakery back-office library.
//!
//! This crate provides the back-office server as a library, allowing it to be
//! tested and reused by the CLI.
//!
//! # Modules
//!
//! - [`db`] - Remote store repositories (`PostgreSQL`)
//! - [`offline`] - Offline cache (`SQLite`) and reconciliation
//! - [`catalogue`] - Cached product catalogue with offline fallback
//! - [`services`] - Offline-first waste entry
//! - [`print`] - Printable documents
//! - [`routes`] - HTTP handlers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalogue;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod offline;
pub mod print;
pub mod routes;
pub mod services;
pub mod state;
