//! Company and operator extractors.
//!
//! The back-office sits behind the bakery's own sign-in; requests carry the
//! tenant in `X-Company-Id` (or a `company` query parameter, for printable
//! pages opened in a new tab) and the signed-in person in `X-Operator`.

use axum::{
    Json,
    extract::{FromRequestParts, Query},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use bakery_core::CompanyId;

/// Header carrying the company partition key.
pub const COMPANY_HEADER: &str = "x-company-id";
/// Header carrying the operator identity.
pub const OPERATOR_HEADER: &str = "x-operator";

/// Extractor for the company the request is scoped to.
///
/// # Example
///
/// ```rust,ignore
/// async fn list(CompanyScope(company_id): CompanyScope) -> impl IntoResponse {
///     format!("company {company_id}")
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CompanyScope(pub CompanyId);

/// Extractor for the operator performing the request.
#[derive(Debug, Clone)]
pub struct Operator(pub String);

/// Error returned when the company or operator is missing or malformed.
#[derive(Debug, PartialEq, Eq)]
pub enum ScopeRejection {
    /// No company header or query parameter.
    MissingCompany,
    /// The company is not a positive integer.
    InvalidCompany,
    /// No operator header.
    MissingOperator,
}

impl IntoResponse for ScopeRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingCompany => (StatusCode::UNAUTHORIZED, "Missing X-Company-Id header"),
            Self::InvalidCompany => (StatusCode::BAD_REQUEST, "Invalid company ID"),
            Self::MissingOperator => (StatusCode::UNAUTHORIZED, "Missing X-Operator header"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
struct CompanyQuery {
    company: Option<String>,
}

fn company_from_query(parts: &Parts) -> Option<String> {
    let Query(query) = Query::<CompanyQuery>::try_from_uri(&parts.uri).ok()?;
    query
        .company
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

impl<S> FromRequestParts<S> for CompanyScope
where
    S: Send + Sync,
{
    type Rejection = ScopeRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = match header_value(parts, COMPANY_HEADER) {
            Some(value) => value.to_string(),
            None => company_from_query(parts).ok_or(ScopeRejection::MissingCompany)?,
        };

        let id: i32 = raw.parse().map_err(|_| ScopeRejection::InvalidCompany)?;
        if id <= 0 {
            return Err(ScopeRejection::InvalidCompany);
        }

        tracing::Span::current().record("company_id", id);
        Ok(Self(CompanyId::new(id)))
    }
}

impl<S> FromRequestParts<S> for Operator
where
    S: Send + Sync,
{
    type Rejection = ScopeRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let operator = header_value(parts, OPERATOR_HEADER).ok_or(ScopeRejection::MissingOperator)?;
        Ok(Self(operator.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_company_from_header() {
        let mut parts = parts("/api/products", &[("X-Company-Id", "7")]);
        let CompanyScope(id) = CompanyScope::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(id, CompanyId::new(7));
    }

    #[tokio::test]
    async fn test_company_from_query() {
        let mut parts = parts("/waste/print?from=2026-01-01&company=3", &[]);
        let CompanyScope(id) = CompanyScope::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(id, CompanyId::new(3));
    }

    #[tokio::test]
    async fn test_company_from_encoded_query() {
        let mut encoded = parts("/waste/print?reason=expired&company=%31%32", &[]);
        let CompanyScope(id) = CompanyScope::from_request_parts(&mut encoded, &()).await.unwrap();
        assert_eq!(id, CompanyId::new(12));

        let mut empty = parts("/waste/print?company=", &[]);
        assert_eq!(
            CompanyScope::from_request_parts(&mut empty, &()).await.unwrap_err(),
            ScopeRejection::MissingCompany
        );
    }

    #[tokio::test]
    async fn test_company_rejections() {
        let mut missing = parts("/api/products", &[]);
        assert_eq!(
            CompanyScope::from_request_parts(&mut missing, &()).await.unwrap_err(),
            ScopeRejection::MissingCompany
        );

        let mut invalid = parts("/api/products", &[("X-Company-Id", "-1")]);
        assert_eq!(
            CompanyScope::from_request_parts(&mut invalid, &()).await.unwrap_err(),
            ScopeRejection::InvalidCompany
        );
    }

    #[tokio::test]
    async fn test_operator() {
        let mut with = parts("/api/waste", &[("X-Operator", " marie ")]);
        let Operator(name) = Operator::from_request_parts(&mut with, &()).await.unwrap();
        assert_eq!(name, "marie");

        let mut without = parts("/api/waste", &[("X-Operator", "  ")]);
        assert_eq!(
            Operator::from_request_parts(&mut without, &()).await.unwrap_err(),
            ScopeRejection::MissingOperator
        );
    }
}
