//! Response envelope and API errors
//!
//! Every endpoint answers with `{"success": true, "data": ...}` or
//! `{"success": false, "error": "...", "code": "..."}`. Service errors are
//! mapped to codes here so handlers can use `?` directly.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::ai::AiError;
use crate::services::{
    AnalyticsServiceError, AuthorServiceError, CatalogError, CategoryServiceError,
    ContactServiceError, PostServiceError, UserServiceError,
};

/// Successful response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Handler result carrying the success envelope
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Wrap `data` in the success envelope
pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::new(data)))
}

/// 201 with the success envelope
pub fn created<T: Serialize>(data: T) -> Result<(StatusCode, Json<ApiResponse<T>>), ApiError> {
    Ok((StatusCode::CREATED, Json(ApiResponse::new(data))))
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
            code: code.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new("RATE_LIMITED", message)
    }

    /// Log the cause and hide it from the client
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {:#}", cause);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            "AI_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
            "AI_PROVIDER_ERROR" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::internal(e)
    }
}

impl From<PostServiceError> for ApiError {
    fn from(e: PostServiceError) -> Self {
        match e {
            PostServiceError::DuplicateSlug(_) => Self::conflict(e.to_string()),
            PostServiceError::NotFound(msg) => Self::not_found(msg),
            PostServiceError::ValidationError(msg) => Self::validation_error(msg),
            PostServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::DuplicateSlug(_) => Self::conflict(e.to_string()),
            CatalogError::NotFound(msg) => Self::not_found(msg),
            CatalogError::ValidationError(msg) => Self::validation_error(msg),
            CatalogError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(e: CategoryServiceError) -> Self {
        match e {
            CategoryServiceError::DuplicateSlug(_) | CategoryServiceError::InUse(_) => {
                Self::conflict(e.to_string())
            }
            CategoryServiceError::NotFound(msg) => Self::not_found(msg),
            CategoryServiceError::ValidationError(msg) => Self::validation_error(msg),
            CategoryServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<AuthorServiceError> for ApiError {
    fn from(e: AuthorServiceError) -> Self {
        match e {
            AuthorServiceError::DuplicateSlug(_) | AuthorServiceError::InUse(_) => {
                Self::conflict(e.to_string())
            }
            AuthorServiceError::NotFound(msg) => Self::not_found(msg),
            AuthorServiceError::ValidationError(msg) => Self::validation_error(msg),
            AuthorServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::AuthenticationError(msg) => Self::unauthorized(msg),
            UserServiceError::RateLimited => Self::rate_limited(e.to_string()),
            UserServiceError::ValidationError(msg) => Self::validation_error(msg),
            UserServiceError::EmailExists(_) | UserServiceError::LastAdmin => {
                Self::conflict(e.to_string())
            }
            UserServiceError::NotFound(msg) => Self::not_found(msg),
            UserServiceError::CannotDeleteSelf => Self::validation_error(e.to_string()),
            UserServiceError::SetupCompleted => Self::forbidden(e.to_string()),
            UserServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<ContactServiceError> for ApiError {
    fn from(e: ContactServiceError) -> Self {
        match e {
            ContactServiceError::ValidationError(msg) => Self::validation_error(msg),
            ContactServiceError::RateLimited => Self::rate_limited(e.to_string()),
            ContactServiceError::NotFound(msg) => Self::not_found(msg),
            ContactServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<AnalyticsServiceError> for ApiError {
    fn from(e: AnalyticsServiceError) -> Self {
        match e {
            AnalyticsServiceError::ValidationError(msg) => Self::validation_error(msg),
            AnalyticsServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<AiError> for ApiError {
    fn from(e: AiError) -> Self {
        match e {
            AiError::Validation(msg) => Self::validation_error(msg),
            AiError::NoModelAvailable(_) => Self::new("AI_UNAVAILABLE", e.to_string()),
            other => {
                tracing::warn!("AI provider error: {}", other);
                Self::new("AI_PROVIDER_ERROR", other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            ("UNAUTHORIZED", StatusCode::UNAUTHORIZED),
            ("FORBIDDEN", StatusCode::FORBIDDEN),
            ("NOT_FOUND", StatusCode::NOT_FOUND),
            ("VALIDATION_ERROR", StatusCode::BAD_REQUEST),
            ("CONFLICT", StatusCode::CONFLICT),
            ("RATE_LIMITED", StatusCode::TOO_MANY_REQUESTS),
            ("AI_UNAVAILABLE", StatusCode::SERVICE_UNAVAILABLE),
            ("AI_PROVIDER_ERROR", StatusCode::BAD_GATEWAY),
            ("SOMETHING_ELSE", StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (code, status) in cases {
            assert_eq!(ApiError::new(code, "x").status(), status);
        }
    }

    #[test]
    fn test_error_envelope_shape() {
        let json = serde_json::to_value(ApiError::not_found("Post not found")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "error": "Post not found", "code": "NOT_FOUND"})
        );
        let json = serde_json::to_value(ApiResponse::new(vec![1, 2])).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": [1, 2]}));
    }

    #[test]
    fn test_internal_errors_are_generic() {
        let err: ApiError = PostServiceError::InternalError(anyhow::anyhow!("db exploded")).into();
        assert_eq!(err.code, "INTERNAL_ERROR");
        assert!(!err.error.contains("db exploded"));
    }

    #[test]
    fn test_service_error_codes() {
        let err: ApiError = CategoryServiceError::InUse(3).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        let err: ApiError = UserServiceError::SetupCompleted.into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        let err: ApiError = ContactServiceError::RateLimited.into();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        let err: ApiError = AiError::NoModelAvailable("seo".into()).into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        let err: ApiError = AiError::Timeout.into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
