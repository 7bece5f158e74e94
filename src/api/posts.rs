//! Blog post API endpoints
//!
//! Public:
//! - GET /api/posts - Published posts (page, limit, category, tag, search, featured)
//! - GET /api/posts/{slug} - One published post
//!
//! Admin:
//! - GET/POST /api/admin/posts
//! - GET/PUT/DELETE /api/admin/posts/{id}
//! - GET /api/admin/posts/slug/{slug} - Any status, for previews

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{filter_text, PageQuery};
use crate::api::middleware::AppState;
use crate::api::responses::{created, ok, ApiError, ApiResponse, ApiResult};
use crate::models::{
    CreatePostInput, PagedResult, Post, PostFilter, PostSort, PostStatus, UpdatePostInput,
};

/// Public list filters
#[derive(Debug, Default, Deserialize)]
pub struct PublicPostQuery {
    /// Category slug
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub featured: Option<bool>,
}

/// Admin list filters
#[derive(Debug, Default, Deserialize)]
pub struct AdminPostQuery {
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub author_id: Option<i64>,
    #[serde(default)]
    pub featured: Option<bool>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: Option<PostSort>,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_published))
        .route("/{slug}", get(get_published))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route("/{id}", get(get_post).put(update_post).delete(delete_post))
        .route("/slug/{slug}", get(get_post_by_slug))
}

/// GET /api/posts
async fn list_published(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(query): Query<PublicPostQuery>,
) -> ApiResult<PagedResult<Post>> {
    let params = page.params();
    let mut filter = PostFilter::published();

    if let Some(slug) = filter_text(query.category) {
        match state.category_service.find_by_slug(&slug).await? {
            Some(category) => filter.category_id = Some(category.id),
            None => return ok(PagedResult::new(Vec::new(), 0, &params)),
        }
    }
    filter.tag = filter_text(query.tag);
    filter.search = filter_text(query.search);
    filter.featured = query.featured;

    ok(state.post_service.list_published(filter, &params).await?)
}

/// GET /api/posts/{slug}
async fn get_published(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Post> {
    ok(state.post_service.get_published_by_slug(&slug).await?)
}

/// GET /api/admin/posts
async fn list_posts(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(query): Query<AdminPostQuery>,
) -> ApiResult<PagedResult<Post>> {
    let filter = PostFilter {
        status: query.status,
        category_id: query.category_id,
        author_id: query.author_id,
        featured: query.featured,
        search: filter_text(query.search),
        tag: filter_text(query.tag),
        sort: query.sort.unwrap_or_default(),
    };
    ok(state.post_service.list(&filter, &page.params()).await?)
}

/// POST /api/admin/posts
async fn create_post(
    State(state): State<AppState>,
    Json(body): Json<CreatePostInput>,
) -> Result<(axum::http::StatusCode, Json<ApiResponse<Post>>), ApiError> {
    let post = state.post_service.create(body).await?;
    tracing::info!("Created post {} ({})", post.id, post.slug);
    created(post)
}

/// GET /api/admin/posts/{id}
async fn get_post(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Post> {
    ok(state.post_service.get(id).await?)
}

/// GET /api/admin/posts/slug/{slug}
async fn get_post_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Post> {
    ok(state.post_service.get_by_slug(&slug).await?)
}

/// PUT /api/admin/posts/{id}
async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePostInput>,
) -> ApiResult<Post> {
    ok(state.post_service.update(id, body).await?)
}

/// DELETE /api/admin/posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    state.post_service.delete(id).await?;
    ok(serde_json::json!({ "id": id }))
}
