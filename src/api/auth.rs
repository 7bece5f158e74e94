//! Authentication API endpoints
//!
//! - POST /api/auth/login - Sign in, sets the session cookie
//! - GET  /api/auth/setup - Whether the first admin still has to be created
//! - POST /api/auth/setup - Create the first admin
//! - POST /api/auth/logout - Sign out
//! - GET  /api/auth/me - Current user
//! - PUT  /api/auth/password - Change own password

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{extract_session_token, AppState, AuthenticatedUser, SESSION_COOKIE};
use crate::api::responses::{ok, ApiError, ApiResponse, ApiResult};
use crate::models::{CreateUserInput, Session, User};
use crate::services::LoginInput;

#[derive(Debug, Deserialize)]
pub struct SetupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Session plus the signed-in user
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub expires_at: String,
}

#[derive(Debug, Serialize)]
pub struct SetupStatus {
    pub needs_setup: bool,
}

/// Routes reachable without a session
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/setup", get(setup_status).post(setup))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/password", put(change_password))
}

fn session_cookie(token: &str, max_age_secs: i64) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    ))
    .map_err(ApiError::internal)
}

fn signed_in(
    state: &AppState,
    session: Session,
    user: User,
    status: StatusCode,
) -> Result<impl IntoResponse, ApiError> {
    let max_age = state.user_service.session_duration().num_seconds();
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, session_cookie(&session.id, max_age)?);

    Ok((
        status,
        headers,
        Json(ApiResponse::new(AuthResponse {
            user,
            expires_at: session.expires_at.to_rfc3339(),
            token: session.id,
        })),
    ))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let (session, user) = state.user_service.login(body).await?;
    signed_in(&state, session, user, StatusCode::OK)
}

/// GET /api/auth/setup
async fn setup_status(State(state): State<AppState>) -> ApiResult<SetupStatus> {
    ok(SetupStatus {
        needs_setup: state.user_service.needs_setup().await?,
    })
}

/// POST /api/auth/setup - only while no user exists
async fn setup(
    State(state): State<AppState>,
    Json(body): Json<SetupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = CreateUserInput::new(body.name, body.email, body.password).admin();
    let (session, user) = state.user_service.setup_first_admin(input).await?;
    tracing::info!("Initial admin {} created", user.email);
    signed_in(&state, session, user, StatusCode::CREATED)
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;
    state.user_service.logout(&token).await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::SET_COOKIE, session_cookie("", 0)?);
    Ok((
        response_headers,
        Json(ApiResponse::new(serde_json::Value::Null)),
    ))
}

/// GET /api/auth/me
async fn me(AuthenticatedUser(user): AuthenticatedUser) -> ApiResult<User> {
    ok(user)
}

/// PUT /api/auth/password - revokes other sessions and issues a new one
async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .user_service
        .change_password(user.id, &body.current_password, &body.new_password)
        .await?;
    let user = state.user_service.get(user.id).await?;
    signed_in(&state, session, user, StatusCode::OK)
}
