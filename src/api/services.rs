//! Service catalog API endpoints
//!
//! Public:
//! - GET /api/services - Active services in display order
//! - GET /api/services/{slug} - One active service
//!
//! Admin:
//! - GET/POST /api/admin/services
//! - PUT /api/admin/services/reorder
//! - GET/PUT/DELETE /api/admin/services/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{filter_text, PageQuery};
use crate::api::middleware::AppState;
use crate::api::responses::{created, ok, ApiError, ApiResponse, ApiResult};
use crate::models::{
    CreateServiceInput, PagedResult, Service, ServiceFilter, ServiceSort, UpdateServiceInput,
};

#[derive(Debug, Default, Deserialize)]
pub struct AdminServiceQuery {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: Option<ServiceSort>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<i64>,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_active))
        .route("/{slug}", get(get_active))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_services).post(create_service))
        .route("/reorder", put(reorder_services))
        .route(
            "/{id}",
            get(get_service).put(update_service).delete(delete_service),
        )
}

/// GET /api/services
async fn list_active(State(state): State<AppState>) -> ApiResult<Vec<Service>> {
    ok(state.catalog.list_active().await?)
}

/// GET /api/services/{slug}
async fn get_active(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Service> {
    ok(state.catalog.get_active_by_slug(&slug).await?)
}

/// GET /api/admin/services
async fn list_services(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(query): Query<AdminServiceQuery>,
) -> ApiResult<PagedResult<Service>> {
    let filter = ServiceFilter {
        active: query.active,
        search: filter_text(query.search),
        sort: query.sort.unwrap_or_default(),
    };
    ok(state.catalog.list(&filter, &page.params()).await?)
}

/// POST /api/admin/services
async fn create_service(
    State(state): State<AppState>,
    Json(body): Json<CreateServiceInput>,
) -> Result<(StatusCode, Json<ApiResponse<Service>>), ApiError> {
    let service = state.catalog.create(body).await?;
    tracing::info!("Created service {} ({})", service.id, service.slug);
    created(service)
}

/// PUT /api/admin/services/reorder - every service id in the new display order
async fn reorder_services(
    State(state): State<AppState>,
    Json(body): Json<ReorderRequest>,
) -> ApiResult<Vec<Service>> {
    ok(state.catalog.reorder(&body.ids).await?)
}

/// GET /api/admin/services/{id}
async fn get_service(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Service> {
    ok(state.catalog.get(id).await?)
}

/// PUT /api/admin/services/{id}
async fn update_service(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateServiceInput>,
) -> ApiResult<Service> {
    ok(state.catalog.update(id, body).await?)
}

/// DELETE /api/admin/services/{id}
async fn delete_service(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    state.catalog.delete(id).await?;
    ok(serde_json::json!({ "id": id }))
}
