//! API layer - HTTP handlers and routing
//!
//! Everything lives under `/api`:
//! - Public site endpoints (posts, services, categories, authors, contact, analytics)
//! - Auth endpoints (login, setup, logout, me, password)
//! - Admin endpoints under `/admin`, behind a session
//! - Account management under `/admin/users`, admins only

pub mod ai;
pub mod analytics;
pub mod auth;
pub mod authors;
pub mod categories;
pub mod common;
pub mod contact;
pub mod dashboard;
pub mod middleware;
pub mod posts;
pub mod responses;
pub mod services;
pub mod users;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub use middleware::{AppState, ApiError, AuthenticatedUser};
pub use responses::{ApiResponse, ApiResult};

use responses::ok;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

/// GET /api/health
async fn health(State(state): State<AppState>) -> ApiResult<Health> {
    let database = match state.pool.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!("Health check database ping failed: {:#}", e);
            "unavailable"
        }
    };
    ok(Health {
        status: "ok",
        database,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the API router (mounted at `/api` by [`build_router`])
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin only
    let user_routes = Router::new()
        .nest("/admin/users", users::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Any signed-in user
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/admin/dashboard", dashboard::admin_router())
        .nest("/admin/posts", posts::admin_router())
        .nest("/admin/services", services::admin_router())
        .nest("/admin/categories", categories::admin_router())
        .nest("/admin/authors", authors::admin_router())
        .nest("/admin/contacts", contact::admin_router())
        .nest("/admin/analytics", analytics::admin_router())
        .nest("/admin/ai", ai::admin_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::public_router())
        .nest("/posts", posts::public_router())
        .nest("/services", services::public_router())
        .nest("/categories", categories::public_router())
        .nest("/authors", authors::public_router())
        .nest("/contact", contact::public_router())
        .nest("/analytics", analytics::public_router())
        .merge(user_routes)
        .merge(protected_routes)
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let origin = if cors_origin.trim() == "*" {
        AllowOrigin::mirror_request()
    } else {
        match cors_origin.parse::<HeaderValue>() {
            Ok(origin) => AllowOrigin::exact(origin),
            Err(_) => {
                tracing::warn!("Invalid CORS origin {:?}, cross-origin requests disabled", cors_origin);
                AllowOrigin::list(Vec::<HeaderValue>::new())
            }
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors_layer(cors_origin)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_accepts_wildcard_and_bad_origin() {
        // Neither may panic; credentials with "*" need a mirrored origin.
        let _ = cors_layer("*");
        let _ = cors_layer("https://example.com");
        let _ = cors_layer("bad\norigin");
    }
}
