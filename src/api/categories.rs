//! Category API endpoints
//!
//! - GET /api/categories - Categories with published post counts
//! - GET/POST /api/admin/categories - Paged categories with total counts
//! - GET/PUT/DELETE /api/admin/categories/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{filter_text, PageQuery};
use crate::api::middleware::AppState;
use crate::api::responses::{created, ok, ApiError, ApiResponse, ApiResult};
use crate::models::{
    Category, CategoryFilter, CategorySort, CategoryWithCount, CreateCategoryInput, PagedResult,
    UpdateCategoryInput,
};

#[derive(Debug, Default, Deserialize)]
pub struct AdminCategoryQuery {
    /// Matches the name or slug
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: Option<CategorySort>,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(list_public))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
}

/// GET /api/categories
async fn list_public(State(state): State<AppState>) -> ApiResult<Vec<CategoryWithCount>> {
    ok(state.category_service.list_public().await?)
}

/// GET /api/admin/categories
async fn list_categories(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(query): Query<AdminCategoryQuery>,
) -> ApiResult<PagedResult<CategoryWithCount>> {
    let filter = CategoryFilter {
        search: filter_text(query.search),
        sort: query.sort.unwrap_or_default(),
    };
    ok(state.category_service.list(&filter, &page.params()).await?)
}

/// POST /api/admin/categories
async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CreateCategoryInput>,
) -> Result<(StatusCode, Json<ApiResponse<Category>>), ApiError> {
    created(state.category_service.create(body).await?)
}

/// GET /api/admin/categories/{id}
async fn get_category(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Category> {
    ok(state.category_service.get(id).await?)
}

/// PUT /api/admin/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCategoryInput>,
) -> ApiResult<Category> {
    ok(state.category_service.update(id, body).await?)
}

/// DELETE /api/admin/categories/{id} - rejected while posts use it
async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    state.category_service.delete(id).await?;
    ok(serde_json::json!({ "id": id }))
}
