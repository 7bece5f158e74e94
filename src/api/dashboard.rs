//! GET /api/admin/dashboard - Counters and recent activity for the admin home

use axum::{extract::State, routing::get, Router};

use crate::api::middleware::AppState;
use crate::api::responses::{ok, ApiResult};
use crate::services::DashboardStats;

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/", get(stats))
}

async fn stats(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    ok(state.dashboard_service.stats().await?)
}
