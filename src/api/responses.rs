//! Shared API response types
//!
//! Every successful body is wrapped in `ApiResponse` or `PaginatedResponse`;
//! failures go through `ApiError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::models::{CartLineWithItem, CartView, Item, OrderLine, OrderWithLines, PagedResult, User};

// ============================================================================
// Envelopes
// ============================================================================

/// `{success: true, message?, data?}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Message only, `data` omitted
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Wrap a response with 201 Created
pub fn created<T: Serialize>(body: ApiResponse<T>) -> Response {
    (StatusCode::CREATED, Json(body)).into_response()
}

/// `{success, data: [...], page, page_size, total_items, total_pages}`
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_items: i64,
    pub total_pages: i64,
}

impl<T> From<PagedResult<T>> for PaginatedResponse<T> {
    fn from(result: PagedResult<T>) -> Self {
        let total_pages = result.total_pages();
        Self {
            success: true,
            page: result.page,
            page_size: result.page_size,
            total_items: result.total,
            total_pages,
            data: result.items,
        }
    }
}

impl<T: Serialize> IntoResponse for PaginatedResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct FavoriteToggleResponse {
    pub item_id: i64,
    pub favorited: bool,
}

// ============================================================================
// Items
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    /// Only present when the caller is authenticated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorited: Option<bool>,
}

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            name: item.name,
            description: item.description,
            price: item.price,
            image_url: item.image_url,
            category: item.category,
            is_active: item.is_active,
            created_at: item.created_at.to_rfc3339(),
            favorited: None,
        }
    }
}

// ============================================================================
// Carts
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CartLineResponse {
    pub id: i64,
    pub cart_id: i64,
    pub item_id: i64,
    pub quantity: i64,
    /// `null` once the item has been deleted
    pub item: Option<ItemResponse>,
    pub subtotal: f64,
}

impl From<CartLineWithItem> for CartLineResponse {
    fn from(line: CartLineWithItem) -> Self {
        let subtotal = line.subtotal();
        Self {
            id: line.line.id,
            cart_id: line.line.cart_id,
            item_id: line.line.item_id,
            quantity: line.line.quantity,
            item: line.item.map(Into::into),
            subtotal,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub id: i64,
    pub user_id: i64,
    pub items: Vec<CartLineResponse>,
    pub total: f64,
    pub item_count: i64,
    pub created_at: String,
}

impl From<CartView> for CartResponse {
    fn from(view: CartView) -> Self {
        let total = view.total();
        let item_count = view.item_count();
        Self {
            id: view.cart.id,
            user_id: view.cart.user_id,
            created_at: view.cart.created_at.to_rfc3339(),
            items: view.lines.into_iter().map(Into::into).collect(),
            total,
            item_count,
        }
    }
}

// ============================================================================
// Orders
// ============================================================================

#[derive(Debug, Serialize)]
pub struct OrderLineResponse {
    pub id: i64,
    pub item_id: i64,
    pub item_name: String,
    pub item_price: f64,
    pub quantity: i64,
    pub subtotal: f64,
}

impl From<OrderLine> for OrderLineResponse {
    fn from(line: OrderLine) -> Self {
        Self {
            id: line.id,
            item_id: line.item_id,
            item_name: line.item_name,
            item_price: line.item_price,
            quantity: line.quantity,
            subtotal: line.subtotal,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub user_id: i64,
    pub total_amount: f64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub items: Vec<OrderLineResponse>,
    pub created_at: String,
}

impl From<OrderWithLines> for OrderResponse {
    fn from(order: OrderWithLines) -> Self {
        Self {
            id: order.order.id,
            user_id: order.order.user_id,
            total_amount: order.order.total_amount,
            status: order.order.status.to_string(),
            note: order.order.note,
            items: order.lines.into_iter().map(Into::into).collect(),
            created_at: order.order.created_at.to_rfc3339(),
        }
    }
}

/// Compact order used by `/orders/my` and cancel
#[derive(Debug, Serialize)]
pub struct OrderSummary {
    pub id: i64,
    pub total_amount: f64,
    pub status: String,
    pub item_count: i64,
    pub created_at: String,
}

impl From<OrderWithLines> for OrderSummary {
    fn from(order: OrderWithLines) -> Self {
        Self {
            item_count: order.item_count(),
            id: order.order.id,
            total_amount: order.order.total_amount,
            status: order.order.status.to_string(),
            created_at: order.order.created_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}
