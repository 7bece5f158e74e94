//! Account management endpoints (admin only)
//!
//! - GET/POST /api/admin/users
//! - GET/PUT/DELETE /api/admin/users/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::common::PageQuery;
use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::api::responses::{created, ok, ApiError, ApiResponse, ApiResult};
use crate::models::{CreateUserInput, PagedResult, UpdateUserInput, User, UserFilter};

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
}

/// GET /api/admin/users
async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(mut filter): Query<UserFilter>,
) -> ApiResult<PagedResult<User>> {
    filter.search = crate::api::common::filter_text(filter.search);
    ok(state.user_service.list(&filter, &page.params()).await?)
}

/// POST /api/admin/users - also sends the welcome email
async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserInput>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), ApiError> {
    let user = state.user_service.create(body).await?;
    if let Err(e) = state.email_service.send_welcome(&user).await {
        tracing::warn!("Failed to send welcome email to user {}: {:#}", user.id, e);
    }
    created(user)
}

async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<User> {
    ok(state.user_service.get(id).await?)
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateUserInput>,
) -> ApiResult<User> {
    ok(state.user_service.update(id, body).await?)
}

/// DELETE /api/admin/users/{id} - an admin cannot delete themselves
async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(acting): AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    state.user_service.delete(id, acting.id).await?;
    ok(serde_json::json!({ "id": id }))
}
