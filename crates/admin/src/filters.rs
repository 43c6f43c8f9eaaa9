//! Custom Askama template filters for the print pages.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// CSS class aligning a table cell: figures right, text left.
///
/// Usage in templates: `<td class="{{ column.numeric|cell_class }}">`
#[askama::filter_fn]
pub fn cell_class(numeric: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(if numeric.to_string() == "true" {
        "num"
    } else {
        "text"
    })
}
