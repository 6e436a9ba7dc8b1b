//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`; a subset is also mounted without the
//! prefix for older clients. Includes:
//! - User, session and favorites endpoints
//! - Catalog (item) endpoints
//! - Cart endpoints
//! - Order endpoints
//! - Health check

pub mod carts;
pub mod common;
pub mod health;
pub mod items;
pub mod middleware;
pub mod orders;
pub mod responses;
pub mod users;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ServerConfig;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .nest("/users", users::protected_router())
        .nest("/carts", carts::router())
        .nest("/orders", orders::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .nest("/users", users::router())
        .nest("/items", items::router(state))
        .merge(protected_routes)
}

/// Unprefixed routes kept for older clients
fn build_legacy_router(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .route("/users/logout", post(users::logout))
        .route("/carts", post(carts::add_to_cart).get(carts::list_carts))
        .route("/orders", post(orders::checkout).get(orders::list_orders))
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    Router::new()
        .route("/users", post(users::register).get(users::list_users))
        .route("/users/login", post(users::login))
        .route("/items", post(items::create_item).get(items::list_items))
        .merge(protected_routes)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let allow_origin = if config.allowed_origins.iter().any(|o| o == "*") {
        // Credentials forbid a literal `*`, so echo the caller's origin instead
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .expose_headers([header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", build_api_router(state.clone()))
        .merge(build_legacy_router(state.clone()))
        .layer(axum_middleware::from_fn(middleware::rate_limit))
        .layer(axum_middleware::from_fn(middleware::security_headers))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
