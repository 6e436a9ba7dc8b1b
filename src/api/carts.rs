//! Cart API endpoints (all behind the session guard)
//!
//! - POST /api/v1/carts - Add item to the caller's cart
//! - GET /api/v1/carts - All carts
//! - GET /api/v1/carts/my - Caller's cart
//! - DELETE /api/v1/carts/my - Clear caller's cart
//! - PUT /api/v1/carts/items/{id} - Set line quantity (0 removes)
//! - DELETE /api/v1/carts/items/{id} - Remove line

use axum::{
    extract::{Path, State},
    routing::{post, put},
    Router,
};
use serde::Deserialize;

use crate::api::common::{parse_id, ValidatedJson};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{ApiResponse, CartResponse};
use crate::models::CartView;
use crate::services::LineUpdate;

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub item_id: i64,
    /// Defaults to 1
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLineRequest {
    pub quantity: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(add_to_cart).get(list_carts))
        .route("/my", axum::routing::get(get_my_cart).delete(clear_cart))
        .route("/items/{id}", put(update_line).delete(remove_line))
}

/// POST /api/v1/carts
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(body): ValidatedJson<AddToCartRequest>,
) -> Result<ApiResponse<CartResponse>, ApiError> {
    let view = state
        .cart_service
        .add_item(user.0.id, body.item_id, body.quantity.unwrap_or(1))
        .await?;

    Ok(ApiResponse::with_message("Item added to cart", view.into()))
}

/// GET /api/v1/carts
pub async fn list_carts(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<ApiResponse<Vec<CartResponse>>, ApiError> {
    let carts = state.cart_service.list_all().await?;
    Ok(ApiResponse::ok(carts.into_iter().map(Into::into).collect()))
}

/// GET /api/v1/carts/my
///
/// A caller without a cart gets an empty one with id 0.
async fn get_my_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<ApiResponse<CartResponse>, ApiError> {
    match state.cart_service.get_cart(user.0.id).await? {
        Some(view) => Ok(ApiResponse::ok(view.into())),
        None => Ok(ApiResponse::with_message(
            "Cart is empty",
            CartView::empty_for(user.0.id).into(),
        )),
    }
}

/// PUT /api/v1/carts/items/{id}
async fn update_line(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateLineRequest>,
) -> Result<ApiResponse<CartResponse>, ApiError> {
    let line_id = parse_id(&id, "cart item")?;

    match state
        .cart_service
        .update_line(user.0.id, line_id, body.quantity)
        .await?
    {
        LineUpdate::Updated(view) => Ok(ApiResponse::with_message("Cart item updated", view.into())),
        LineUpdate::Removed => Ok(ApiResponse {
            success: true,
            message: Some("Item removed from cart".to_string()),
            data: None,
        }),
    }
}

/// DELETE /api/v1/carts/items/{id}
async fn remove_line(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    let line_id = parse_id(&id, "cart item")?;
    state.cart_service.remove_line(user.0.id, line_id).await?;
    Ok(ApiResponse::message("Item removed from cart"))
}

/// DELETE /api/v1/carts/my
async fn clear_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<ApiResponse<()>, ApiError> {
    let message = if state.cart_service.clear(user.0.id).await? {
        "Cart cleared successfully"
    } else {
        "Cart was already empty"
    };
    Ok(ApiResponse::message(message))
}
