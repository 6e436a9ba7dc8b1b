//! Health check endpoint
//!
//! - GET /health

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::api::middleware::AppState;
use crate::api::responses::HealthResponse;

/// GET /health
///
/// Pings the database; 503 when it cannot be reached.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.pool.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                message: "ShopEase API is running",
            }),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy",
                    message: "Database is unreachable",
                }),
            )
        }
    }
}
