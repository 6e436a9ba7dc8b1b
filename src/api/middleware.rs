//! API middleware
//!
//! Contains:
//! - `AppState`, the shared services handed to every handler
//! - `ApiError`, the failure envelope every handler returns
//! - the session guard (`require_auth`, `optional_auth`)
//! - security headers and the rate-limit hook

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::db::repositories::{
    SqlxCartRepository, SqlxFavoriteRepository, SqlxItemRepository, SqlxOrderRepository,
    SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    CartService, CartServiceError, FavoriteService, FavoriteServiceError, GuardError, ItemService,
    ItemServiceError, OrderService, OrderServiceError, TokenService, UserService, UserServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub item_service: Arc<ItemService>,
    pub cart_service: Arc<CartService>,
    pub order_service: Arc<OrderService>,
    pub favorite_service: Arc<FavoriteService>,
}

impl AppState {
    /// Wire repositories and services over one pool
    pub fn new(pool: DynDatabasePool, auth: &AuthConfig) -> Self {
        let users = SqlxUserRepository::boxed(pool.clone());
        let items = SqlxItemRepository::boxed(pool.clone());
        let carts = SqlxCartRepository::boxed(pool.clone());
        let orders = SqlxOrderRepository::boxed(pool.clone());
        let favorites = SqlxFavoriteRepository::boxed(pool.clone());

        Self {
            user_service: Arc::new(UserService::new(users, TokenService::from_config(auth))),
            item_service: Arc::new(ItemService::new(items.clone())),
            cart_service: Arc::new(CartService::new(carts.clone(), items.clone())),
            order_service: Arc::new(OrderService::new(orders, carts)),
            favorite_service: Arc::new(FavoriteService::new(favorites, items)),
            pool,
        }
    }
}

/// The user resolved by the session guard
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authorization header is required"))
    }
}

/// The caller, if `optional_auth` could resolve one
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts.extensions.get::<AuthenticatedUser>().map(|u| u.0.clone()),
        ))
    }
}

// ============================================================================
// Error envelope
// ============================================================================

/// Failure envelope: `{success: false, error, details?}`
#[derive(Debug, Serialize)]
pub struct ApiError {
    /// Category, mapped to the status code; not serialized
    #[serde(skip)]
    pub code: &'static str,
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            success: false,
            error: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<serde_json::Value>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Malformed or invalid request data
    pub fn validation_error(details: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", "Invalid request data").with_details(details.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Logs the cause and returns a generic message for the operation
    pub fn internal_error(operation: &str, cause: impl std::fmt::Display) -> Self {
        tracing::error!("{}: {}", operation, cause);
        Self::new("INTERNAL_ERROR", "Internal server error").with_details(operation.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self.code {
            "VALIDATION_ERROR" | "BAD_REQUEST" | "STATE_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists => ApiError::conflict("Username already exists"),
            UserServiceError::InvalidCredentials => ApiError::bad_request("Invalid username/password"),
            UserServiceError::SessionConflict => {
                ApiError::forbidden("User is already logged in on another device")
            }
            UserServiceError::NotFound => ApiError::not_found("User not found"),
            UserServiceError::InternalError(e) => ApiError::internal_error("User operation failed", e),
        }
    }
}

impl From<ItemServiceError> for ApiError {
    fn from(e: ItemServiceError) -> Self {
        match e {
            ItemServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ItemServiceError::NotFound => ApiError::not_found("Item not found"),
            ItemServiceError::InternalError(e) => ApiError::internal_error("Item operation failed", e),
        }
    }
}

impl From<CartServiceError> for ApiError {
    fn from(e: CartServiceError) -> Self {
        match e {
            CartServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CartServiceError::ItemNotFound => ApiError::not_found("Item not found"),
            CartServiceError::ItemInactive => ApiError::bad_request("Item is not available"),
            CartServiceError::LineNotFound => ApiError::not_found("Cart item not found"),
            CartServiceError::Forbidden => ApiError::forbidden("Not authorized to modify this cart"),
            CartServiceError::InternalError(e) => ApiError::internal_error("Cart operation failed", e),
        }
    }
}

impl From<OrderServiceError> for ApiError {
    fn from(e: OrderServiceError) -> Self {
        match e {
            OrderServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            OrderServiceError::CartNotFound => ApiError::not_found("Cart not found"),
            OrderServiceError::NotFound => ApiError::not_found("Order not found"),
            OrderServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            OrderServiceError::EmptyCart => ApiError::new("STATE_ERROR", "Cart is empty"),
            e @ OrderServiceError::CartChanged => ApiError::conflict(e.to_string()),
            OrderServiceError::InvalidLine => ApiError::bad_request("Invalid item in cart"),
            OrderServiceError::InvalidStatus => ApiError::bad_request("Invalid order status"),
            e @ OrderServiceError::InvalidState(_) => ApiError::new("STATE_ERROR", e.to_string()),
            OrderServiceError::InternalError(e) => ApiError::internal_error("Order operation failed", e),
        }
    }
}

impl From<FavoriteServiceError> for ApiError {
    fn from(e: FavoriteServiceError) -> Self {
        match e {
            FavoriteServiceError::ItemNotFound => ApiError::not_found("Item not found"),
            FavoriteServiceError::InternalError(e) => {
                ApiError::internal_error("Favorite operation failed", e)
            }
        }
    }
}

impl From<GuardError> for ApiError {
    fn from(e: GuardError) -> Self {
        match e {
            GuardError::InternalError(e) => ApiError::internal_error("Session validation failed", e),
            other => ApiError::unauthorized(other.to_string()),
        }
    }
}

// ============================================================================
// Session guard
// ============================================================================

/// Why no bearer token could be read from the request
#[derive(Debug, PartialEq, Eq)]
enum BearerError {
    Missing,
    Malformed,
}

/// Read `Authorization: Bearer <token>`
fn extract_bearer_token(request: &Request) -> Result<String, BearerError> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(BearerError::Missing)?
        .to_str()
        .map_err(|_| BearerError::Malformed)?;

    match value.split_once(' ') {
        Some(("Bearer", token)) if !token.is_empty() && !token.contains(' ') => {
            Ok(token.to_string())
        }
        _ => Err(BearerError::Malformed),
    }
}

/// Authentication middleware
///
/// Rejects the request unless the bearer token verifies and is the user's
/// current stored session.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&request).map_err(|e| match e {
        BearerError::Missing => ApiError::unauthorized("Authorization header is required"),
        BearerError::Malformed => ApiError::unauthorized("Invalid authorization format"),
    })?;

    let user = state.user_service.authenticate(&token).await?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Optional authentication middleware
///
/// Same checks as `require_auth`, but any failure just leaves the request anonymous.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Ok(token) = extract_bearer_token(&request) {
        if let Ok(user) = state.user_service.authenticate(&token).await {
            request.extensions_mut().insert(AuthenticatedUser(user));
        }
    }
    next.run(request).await
}

// ============================================================================
// Response hardening
// ============================================================================

pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("x-xss-protection", HeaderValue::from_static("1; mode=block"));

    response
}

/// Rate limiting hook. Currently lets every request through.
pub async fn rate_limit(request: Request, next: Next) -> Response {
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_auth(value: &str) -> Request {
        Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_extract_bearer_token() {
        let request = request_with_auth("Bearer abc.def.ghi");
        assert_eq!(extract_bearer_token(&request), Ok("abc.def.ghi".to_string()));
    }

    #[test]
    fn test_extract_bearer_token_missing() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        assert_eq!(extract_bearer_token(&request), Err(BearerError::Missing));
    }

    #[test]
    fn test_extract_bearer_token_malformed() {
        for value in ["Basic abc", "Bearer", "Bearer ", "bearer abc", "Bearer a b", "abc"] {
            assert_eq!(
                extract_bearer_token(&request_with_auth(value)),
                Err(BearerError::Malformed),
                "{:?} should be malformed",
                value
            );
        }
    }

    #[tokio::test]
    async fn test_security_headers_on_unmatched_routes() {
        use tower::ServiceExt;

        let app = axum::Router::new()
            .route("/ping", axum::routing::get(|| async { "pong" }))
            .layer(axum::middleware::from_fn(rate_limit))
            .layer(axum::middleware::from_fn(security_headers));

        let response = app
            .oneshot(Request::builder().uri("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert_eq!(response.headers()["x-xss-protection"], "1; mode=block");
    }

    #[test]
    fn test_api_error_envelope() {
        let error = ApiError::not_found("Item not found");
        assert_eq!(error.status(), StatusCode::NOT_FOUND);

        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "error": "Item not found"})
        );
    }

    #[test]
    fn test_validation_error_has_details() {
        let error = ApiError::validation_error("missing field `username`");
        let json = serde_json::to_value(&error).unwrap();

        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid request data");
        assert_eq!(json["details"], "missing field `username`");
    }

    #[test]
    fn test_service_error_mapping() {
        assert_eq!(
            ApiError::from(UserServiceError::SessionConflict).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(UserServiceError::UserExists).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(UserServiceError::InvalidCredentials).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(OrderServiceError::EmptyCart).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(OrderServiceError::CartChanged).status(),
            StatusCode::CONFLICT
        );

        let superseded = ApiError::from(GuardError::SessionSuperseded);
        assert_eq!(superseded.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(superseded.error, "Session expired. Please login again.");

        let internal = ApiError::from(CartServiceError::InternalError(anyhow::anyhow!("db down")));
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.error, "Internal server error");
    }
}
