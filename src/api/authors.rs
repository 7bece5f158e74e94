//! Author API endpoints
//!
//! - GET /api/authors - Authors with published post counts
//! - GET/POST /api/admin/authors
//! - GET/PUT/DELETE /api/admin/authors/{id}

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
    Author, AuthorFilter, AuthorSort, AuthorWithCount, CreateAuthorInput, PagedResult,
    UpdateAuthorInput,
};

#[derive(Debug, Default, Deserialize)]
pub struct AdminAuthorQuery {
    /// Matches the name or email
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: Option<AuthorSort>,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(list_public))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_authors).post(create_author))
        .route("/{id}", get(get_author).put(update_author).delete(delete_author))
}

/// GET /api/authors
async fn list_public(State(state): State<AppState>) -> ApiResult<Vec<AuthorWithCount>> {
    ok(state.author_service.list_public().await?)
}

/// GET /api/admin/authors
async fn list_authors(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(query): Query<AdminAuthorQuery>,
) -> ApiResult<PagedResult<AuthorWithCount>> {
    let filter = AuthorFilter {
        search: filter_text(query.search),
        sort: query.sort.unwrap_or_default(),
    };
    ok(state.author_service.list(&filter, &page.params()).await?)
}

/// POST /api/admin/authors
async fn create_author(
    State(state): State<AppState>,
    Json(body): Json<CreateAuthorInput>,
) -> Result<(StatusCode, Json<ApiResponse<Author>>), ApiError> {
    created(state.author_service.create(body).await?)
}

async fn get_author(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Author> {
    ok(state.author_service.get(id).await?)
}

async fn update_author(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateAuthorInput>,
) -> ApiResult<Author> {
    ok(state.author_service.update(id, body).await?)
}

/// DELETE /api/admin/authors/{id} - rejected while posts credit the author
async fn delete_author(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    state.author_service.delete(id).await?;
    ok(serde_json::json!({ "id": id }))
}
