//! Common API utilities and shared types
//!
//! Request-side helpers used across endpoints: pagination query, validated
//! extractors and path id parsing.

use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};

use crate::api::middleware::ApiError;
use crate::models::ListParams;

/// `?page=&page_size=`; out-of-range values fall back to defaults
#[derive(Debug, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl From<PaginationQuery> for ListParams {
    fn from(query: PaginationQuery) -> Self {
        ListParams::new(query.page, query.page_size)
    }
}

/// JSON body extractor that rejects with the API error envelope
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation_error(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Query string extractor that rejects with the API error envelope
#[derive(Debug)]
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::validation_error(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Parse a path id, rejecting with "Invalid <what> ID"
pub fn parse_id(raw: &str, what: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid {} ID", what)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_PAGE_SIZE;

    #[test]
    fn test_pagination_query_defaults() {
        let params: ListParams = PaginationQuery::default().into();
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_pagination_query_out_of_range() {
        let params: ListParams = PaginationQuery {
            page: Some(-3),
            page_size: Some(500),
        }
        .into();
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42", "item").unwrap(), 42);

        let err = parse_id("abc", "item").unwrap_err();
        assert_eq!(err.error, "Invalid item ID");
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);

        assert_eq!(parse_id("0", "order").unwrap_err().error, "Invalid order ID");
    }
}
