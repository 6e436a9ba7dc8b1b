//! Item (catalog) API endpoints
//!
//! - GET /api/v1/items - List active items, paginated, optional `category`
//! - GET /api/v1/items/categories - Distinct categories
//! - GET /api/v1/items/{id} - Item detail (`favorited` when logged in)
//! - POST /api/v1/items - Create
//! - PUT /api/v1/items/{id} - Update
//! - DELETE /api/v1/items/{id} - Soft delete

use axum::{
    extract::{Path, State},
    middleware as axum_middleware,
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::api::common::{parse_id, ValidatedJson, ValidatedQuery};
use crate::api::middleware::{optional_auth, ApiError, AppState, MaybeUser};
use crate::api::responses::{created, ApiResponse, ItemResponse, PaginatedResponse};
use crate::models::{CreateItemInput, ListParams, UpdateItemInput};

#[derive(Debug, Deserialize)]
pub struct ListItemsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub image_url: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Build the items router
///
/// `state` is needed for the optional-auth layer on the detail route.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(create_item).get(list_items))
        .route("/categories", get(list_categories))
        .route(
            "/{id}",
            get(get_item).route_layer(axum_middleware::from_fn_with_state(state, optional_auth)),
        )
        .route("/{id}", axum::routing::put(update_item).delete(delete_item))
}

/// POST /api/v1/items
pub async fn create_item(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateItemRequest>,
) -> Result<Response, ApiError> {
    let input = CreateItemInput {
        name: body.name,
        description: body.description,
        price: body.price,
        image_url: non_blank(body.image_url),
        category: non_blank(body.category),
    };

    let item = state.item_service.create(input).await?;

    Ok(created(ApiResponse::with_message(
        "Item created successfully",
        ItemResponse::from(item),
    )))
}

/// GET /api/v1/items
pub async fn list_items(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<ListItemsQuery>,
) -> Result<PaginatedResponse<ItemResponse>, ApiError> {
    let params = ListParams::new(query.page, query.page_size);
    let page = state
        .item_service
        .list(query.category.as_deref(), params)
        .await?;

    Ok(page.map(ItemResponse::from).into())
}

/// GET /api/v1/items/categories
async fn list_categories(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<String>>, ApiError> {
    Ok(ApiResponse::ok(state.item_service.categories().await?))
}

/// GET /api/v1/items/{id}
async fn get_item(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<ItemResponse>, ApiError> {
    let id = parse_id(&id, "item")?;
    let item = state.item_service.get(id).await?;

    let mut response = ItemResponse::from(item);
    if let Some(user) = user {
        response.favorited = Some(state.favorite_service.is_favorite(user.id, id).await?);
    }

    Ok(ApiResponse::ok(response))
}

/// PUT /api/v1/items/{id}
async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateItemRequest>,
) -> Result<ApiResponse<ItemResponse>, ApiError> {
    let id = parse_id(&id, "item")?;
    let input = UpdateItemInput {
        name: body.name,
        description: body.description,
        price: body.price,
        image_url: non_blank(body.image_url),
        category: body.category,
        is_active: body.is_active,
    };

    let item = state.item_service.update(id, input).await?;

    Ok(ApiResponse::with_message(
        "Item updated successfully",
        item.into(),
    ))
}

/// DELETE /api/v1/items/{id}
async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    let id = parse_id(&id, "item")?;
    state.item_service.delete(id).await?;
    Ok(ApiResponse::message("Item deleted successfully"))
}
