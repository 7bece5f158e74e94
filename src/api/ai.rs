//! AI content endpoints (admin)
//!
//! - GET  /api/admin/ai/models - Provider and model availability
//! - POST /api/admin/ai/blog-post
//! - POST /api/admin/ai/service-description
//! - POST /api/admin/ai/seo
//! - POST /api/admin/ai/excerpt
//! - POST /api/admin/ai/image

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::ai::content::{
    BlogPostRequest, ExcerptRequest, Generated, GeneratedExcerpt, GeneratedPost,
    GeneratedService, SeoMetadata, SeoRequest, ServiceDescriptionRequest,
};
use crate::ai::image::{ImageBrief, ImageResult};
use crate::ai::models::AiStatus;
use crate::api::middleware::AppState;
use crate::api::responses::{ok, ApiResult};

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/models", get(models))
        .route("/blog-post", post(blog_post))
        .route("/service-description", post(service_description))
        .route("/seo", post(seo))
        .route("/excerpt", post(excerpt))
        .route("/image", post(image))
}

async fn models(State(state): State<AppState>) -> ApiResult<AiStatus> {
    ok(state.models.status())
}

async fn blog_post(
    State(state): State<AppState>,
    Json(body): Json<BlogPostRequest>,
) -> ApiResult<Generated<GeneratedPost>> {
    ok(state.content_generator.blog_post(&body).await?)
}

async fn service_description(
    State(state): State<AppState>,
    Json(body): Json<ServiceDescriptionRequest>,
) -> ApiResult<Generated<GeneratedService>> {
    ok(state.content_generator.service_description(&body).await?)
}

async fn seo(
    State(state): State<AppState>,
    Json(body): Json<SeoRequest>,
) -> ApiResult<Generated<SeoMetadata>> {
    ok(state.content_generator.seo(&body).await?)
}

async fn excerpt(
    State(state): State<AppState>,
    Json(body): Json<ExcerptRequest>,
) -> ApiResult<Generated<GeneratedExcerpt>> {
    ok(state.content_generator.excerpt(&body).await?)
}

async fn image(
    State(state): State<AppState>,
    Json(body): Json<ImageBrief>,
) -> ApiResult<ImageResult> {
    ok(state.image_generator.generate(&body).await?)
}
