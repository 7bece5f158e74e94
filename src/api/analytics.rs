//! Page view tracking
//!
//! - POST /api/analytics/view - Record a view (public, called by the site)
//! - GET /api/admin/analytics/summary?days=30 - Daily views, visitors, top paths

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{client_info, AppState};
use crate::api::responses::{ok, ApiResult};
use crate::models::AnalyticsSummary;
use crate::services::RecordViewInput;

const DEFAULT_SUMMARY_DAYS: u32 = 30;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    DEFAULT_SUMMARY_DAYS
}

#[derive(Debug, Serialize)]
pub struct RecordedView {
    pub id: i64,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/view", post(record_view))
}

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/summary", get(summary))
}

/// POST /api/analytics/view
async fn record_view(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RecordViewInput>,
) -> ApiResult<RecordedView> {
    let id = state
        .analytics_service
        .record_view(body, client_info(&headers))
        .await?;
    ok(RecordedView { id })
}

/// GET /api/admin/analytics/summary
async fn summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<AnalyticsSummary> {
    ok(state.analytics_service.summary(query.days).await?)
}
