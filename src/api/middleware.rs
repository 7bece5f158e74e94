//! API middleware
//!
//! Contains:
//! - Shared application state
//! - Authentication (session token validation)
//! - Authorization (admin-only routes)
//! - Client metadata extraction for rate limiting and analytics

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::ai::{ContentGenerator, ImageGenerator, ModelManager};
use crate::cache::SharedCache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxAnalyticsRepository, SqlxAuthorRepository, SqlxCategoryRepository,
    SqlxContactRepository, SqlxPostRepository, SqlxServiceRepository, SqlxSessionRepository,
    SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use crate::services::{
    AnalyticsService, AuthorService, CategoryService, ClientInfo, ContactService,
    DashboardService, EmailService, PostService, ServiceCatalog, UserService,
};

pub use crate::api::responses::ApiError;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub catalog: Arc<ServiceCatalog>,
    pub category_service: Arc<CategoryService>,
    pub author_service: Arc<AuthorService>,
    pub contact_service: Arc<ContactService>,
    pub analytics_service: Arc<AnalyticsService>,
    pub dashboard_service: Arc<DashboardService>,
    pub email_service: Arc<EmailService>,
    pub models: Arc<ModelManager>,
    pub content_generator: Arc<ContentGenerator>,
    pub image_generator: Arc<ImageGenerator>,
}

impl AppState {
    /// Wire repositories and services over one pool and cache
    pub fn new(
        pool: DynDatabasePool,
        cache: SharedCache,
        config: &Config,
        email_service: EmailService,
        models: ModelManager,
    ) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let service_repo = SqlxServiceRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let author_repo = SqlxAuthorRepository::boxed(pool.clone());
        let contact_repo = SqlxContactRepository::boxed(pool.clone());
        let analytics_repo = SqlxAnalyticsRepository::boxed(pool.clone());

        let email_service = Arc::new(email_service);
        let models = Arc::new(models);

        Self {
            user_service: Arc::new(UserService::with_session_days(
                user_repo.clone(),
                SqlxSessionRepository::boxed(pool.clone()),
                config.auth.session_days,
            )),
            post_service: Arc::new(PostService::new(
                post_repo.clone(),
                category_repo.clone(),
                author_repo.clone(),
                cache.clone(),
            )),
            catalog: Arc::new(ServiceCatalog::new(service_repo.clone(), cache.clone())),
            category_service: Arc::new(CategoryService::new(
                category_repo,
                post_repo.clone(),
                cache.clone(),
            )),
            author_service: Arc::new(AuthorService::new(author_repo, post_repo.clone(), cache)),
            contact_service: Arc::new(ContactService::new(
                contact_repo.clone(),
                email_service.clone(),
                config.contact.max_per_hour,
            )),
            analytics_service: Arc::new(AnalyticsService::new(
                analytics_repo.clone(),
                post_repo.clone(),
            )),
            dashboard_service: Arc::new(DashboardService::new(
                post_repo,
                service_repo,
                contact_repo,
                user_repo,
                analytics_repo,
            )),
            email_service,
            content_generator: Arc::new(ContentGenerator::new(models.clone())),
            image_generator: Arc::new(ImageGenerator::new(models.clone())),
            models,
            pool,
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Session token from `Authorization: Bearer` or the session cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    let prefix = format!("{}=", SESSION_COOKIE);
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().strip_prefix(prefix.as_str()))
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

/// Client IP from proxy headers, plus the user agent
pub fn client_info(headers: &HeaderMap) -> ClientInfo {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let ip = header_str("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .or_else(|| header_str("x-real-ip"))
        .map(str::to_string);

    ClientInfo {
        ip,
        user_agent: header_str(header::USER_AGENT.as_str()).map(str::to_string),
    }
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Admin authorization middleware, runs after `require_auth`
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if user.0.role != UserRole::Admin {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}
