//! Order API endpoints (all behind the session guard)
//!
//! - POST /api/v1/orders - Checkout a cart
//! - GET /api/v1/orders - All orders, paginated
//! - GET /api/v1/orders/my - Caller's orders
//! - GET /api/v1/orders/{id} - Order detail
//! - PATCH /api/v1/orders/{id}/status - Set status
//! - POST /api/v1/orders/{id}/cancel - Cancel

use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;

use crate::api::common::{parse_id, PaginationQuery, ValidatedJson, ValidatedQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{created, ApiResponse, OrderResponse, OrderSummary, PaginatedResponse};

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub cart_id: i64,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout).get(list_orders))
        .route("/my", get(list_my_orders))
        .route("/{id}", get(get_order))
        .route("/{id}/status", patch(update_status))
        .route("/{id}/cancel", post(cancel_order))
}

/// POST /api/v1/orders
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(body): ValidatedJson<CheckoutRequest>,
) -> Result<Response, ApiError> {
    let order = state
        .order_service
        .checkout(user.0.id, body.cart_id, body.note)
        .await?;

    Ok(created(ApiResponse::with_message(
        "Order placed successfully",
        OrderResponse::from(order),
    )))
}

/// GET /api/v1/orders
pub async fn list_orders(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    ValidatedQuery(query): ValidatedQuery<PaginationQuery>,
) -> Result<PaginatedResponse<OrderResponse>, ApiError> {
    let page = state.order_service.list(query.into()).await?;
    Ok(page.map(OrderResponse::from).into())
}

/// GET /api/v1/orders/my
async fn list_my_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<ApiResponse<Vec<OrderSummary>>, ApiError> {
    let orders = state.order_service.list_for_user(user.0.id).await?;
    Ok(ApiResponse::ok(orders.into_iter().map(Into::into).collect()))
}

/// GET /api/v1/orders/{id}
async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<OrderResponse>, ApiError> {
    let id = parse_id(&id, "order")?;
    let order = state.order_service.get(user.0.id, id).await?;
    Ok(ApiResponse::ok(order.into()))
}

/// PATCH /api/v1/orders/{id}/status
async fn update_status(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateStatusRequest>,
) -> Result<ApiResponse<OrderResponse>, ApiError> {
    let id = parse_id(&id, "order")?;
    let order = state.order_service.update_status(id, &body.status).await?;
    Ok(ApiResponse::with_message("Order status updated", order.into()))
}

/// POST /api/v1/orders/{id}/cancel
async fn cancel_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<OrderSummary>, ApiError> {
    let id = parse_id(&id, "order")?;
    let order = state.order_service.cancel(user.0.id, id).await?;
    Ok(ApiResponse::with_message(
        "Order cancelled successfully",
        order.into(),
    ))
}
