//! User API endpoints
//!
//! - POST /api/v1/users - Register
//! - GET /api/v1/users - List users
//! - POST /api/v1/users/login - Login
//! - POST /api/v1/users/logout - Logout (auth)
//! - GET /api/v1/users/me - Current user (auth)
//! - GET/POST /api/v1/users/favorites - Favorites (auth)

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::api::common::ValidatedJson;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{
    created, ApiResponse, FavoriteToggleResponse, ItemResponse, LoginResponse, UserResponse,
};
use crate::services::{LoginInput, RegisterInput};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ToggleFavoriteRequest {
    pub item_id: i64,
}

/// Routes open to anonymous callers
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register).get(list_users))
        .route("/login", post(login))
}

/// Routes that need the session guard
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/favorites", get(list_favorites).post(toggle_favorite))
}

/// POST /api/v1/users
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> Result<Response, ApiError> {
    let mut input = RegisterInput::new(body.username, body.password);
    if let Some(email) = body.email {
        input = input.with_email(email);
    }

    let user = state.user_service.register(input).await?;

    Ok(created(ApiResponse::with_message(
        "User created successfully",
        UserResponse::from(user),
    )))
}

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<UserResponse>>, ApiError> {
    let users = state.user_service.list().await?;
    Ok(ApiResponse::ok(users.into_iter().map(Into::into).collect()))
}

/// POST /api/v1/users/login
///
/// The token is returned in the body and echoed in the `Authorization` header.
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let outcome = state
        .user_service
        .login(LoginInput::new(body.username, body.password))
        .await?;

    let header_value = HeaderValue::from_str(&outcome.token)
        .map_err(|e| ApiError::internal_error("Failed to build login response", e))?;

    let body = ApiResponse::with_message(
        "Login successful",
        LoginResponse {
            token: outcome.token,
            user: outcome.user.into(),
        },
    );

    Ok(([(header::AUTHORIZATION, header_value)], body).into_response())
}

/// POST /api/v1/users/logout
pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<ApiResponse<()>, ApiError> {
    state.user_service.logout(user.0.id).await?;
    Ok(ApiResponse::message("Logged out successfully"))
}

/// GET /api/v1/users/me
async fn get_current_user(user: AuthenticatedUser) -> ApiResponse<UserResponse> {
    ApiResponse::ok(user.0.into())
}

/// GET /api/v1/users/favorites
async fn list_favorites(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<ApiResponse<Vec<ItemResponse>>, ApiError> {
    let items = state.favorite_service.list(user.0.id).await?;
    Ok(ApiResponse::ok(items.into_iter().map(Into::into).collect()))
}

/// POST /api/v1/users/favorites
async fn toggle_favorite(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(body): ValidatedJson<ToggleFavoriteRequest>,
) -> Result<ApiResponse<FavoriteToggleResponse>, ApiError> {
    let favorited = state
        .favorite_service
        .toggle(user.0.id, body.item_id)
        .await?;

    let message = if favorited {
        "Item added to favorites"
    } else {
        "Item removed from favorites"
    };

    Ok(ApiResponse::with_message(
        message,
        FavoriteToggleResponse {
            item_id: body.item_id,
            favorited,
        },
    ))
}
