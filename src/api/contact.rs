//! Contact form endpoints
//!
//! Public:
//! - POST /api/contact - Submit the form (rate limited per client IP)
//!
//! Admin:
//! - GET /api/admin/contacts - Inbox (page, limit, status, search)
//! - GET /api/admin/contacts/counts - Totals per status
//! - GET/DELETE /api/admin/contacts/{id} - Reading marks a new submission read
//! - PUT /api/admin/contacts/{id}/status

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{filter_text, PageQuery};
use crate::api::middleware::{client_info, AppState};
use crate::api::responses::{created, ok, ApiError, ApiResponse, ApiResult};
use crate::models::{ContactFilter, ContactStatus, ContactSubmission, CreateContactInput, PagedResult};
use crate::services::ContactCounts;

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ContactStatus,
}

/// What the visitor gets back; the stored record stays private
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub id: i64,
    pub message: &'static str,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/", post(submit))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_submissions))
        .route("/counts", get(counts))
        .route("/{id}", get(get_submission).delete(delete_submission))
        .route("/{id}/status", put(update_status))
}

/// POST /api/contact
async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateContactInput>,
) -> Result<(StatusCode, Json<ApiResponse<SubmitResponse>>), ApiError> {
    let submission = state
        .contact_service
        .submit(body, client_info(&headers))
        .await?;
    created(SubmitResponse {
        id: submission.id,
        message: "Thanks for reaching out. We'll be in touch soon.",
    })
}

/// GET /api/admin/contacts
async fn list_submissions(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(mut filter): Query<ContactFilter>,
) -> ApiResult<PagedResult<ContactSubmission>> {
    filter.search = filter_text(filter.search);
    ok(state.contact_service.list(&filter, &page.params()).await?)
}

async fn counts(State(state): State<AppState>) -> ApiResult<ContactCounts> {
    ok(state.contact_service.counts().await?)
}

async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ContactSubmission> {
    ok(state.contact_service.get(id).await?)
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> ApiResult<ContactSubmission> {
    ok(state.contact_service.update_status(id, body.status).await?)
}

async fn delete_submission(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    state.contact_service.delete(id).await?;
    ok(serde_json::json!({ "id": id }))
}
