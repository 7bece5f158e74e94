//! Page view analytics

use crate::db::repositories::{AnalyticsRepository, PostRepository};
use crate::models::{non_blank, AnalyticsSummary, NewPageView, PostStatus};
use crate::services::contact::ClientInfo;
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub const MAX_SUMMARY_DAYS: u32 = 365;
pub const TOP_PATHS_LIMIT: i64 = 10;
const MAX_PATH_LENGTH: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Beacon sent by public pages
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordViewInput {
    pub path: String,
    #[serde(default)]
    pub post_slug: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
}

impl RecordViewInput {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_post_slug(mut self, slug: impl Into<String>) -> Self {
        self.post_slug = Some(slug.into());
        self
    }
}

/// Strip query and fragment, force a leading slash, drop a trailing one
pub fn normalize_path(raw: &str) -> String {
    let path = raw
        .trim()
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Hex SHA-256 of ip + user agent
pub fn visitor_hash(ip: Option<&str>, user_agent: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.unwrap_or_default().trim().as_bytes());
    hasher.update([0u8]);
    hasher.update(user_agent.unwrap_or_default().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub struct AnalyticsService {
    repo: Arc<dyn AnalyticsRepository>,
    posts: Arc<dyn PostRepository>,
}

impl AnalyticsService {
    pub fn new(repo: Arc<dyn AnalyticsRepository>, posts: Arc<dyn PostRepository>) -> Self {
        Self { repo, posts }
    }

    /// Store a page view. A `post_slug` naming a published post links the
    /// view to it and bumps its view count; unknown slugs are ignored.
    pub async fn record_view(
        &self,
        input: RecordViewInput,
        client: ClientInfo,
    ) -> Result<i64, AnalyticsServiceError> {
        if input.path.trim().is_empty() || input.path.len() > MAX_PATH_LENGTH {
            return Err(AnalyticsServiceError::ValidationError(format!(
                "Path is required and must be at most {} characters",
                MAX_PATH_LENGTH
            )));
        }

        let mut post_id = None;
        if let Some(slug) = non_blank(input.post_slug) {
            let post = self
                .posts
                .get_by_slug(&slug)
                .await
                .context("Failed to look up post")?;
            if let Some(post) = post.filter(|p| p.status == PostStatus::Published) {
                self.posts
                    .increment_view_count(post.id)
                    .await
                    .context("Failed to increment view count")?;
                post_id = Some(post.id);
            }
        }

        let view = NewPageView {
            path: normalize_path(&input.path),
            post_id,
            referrer: non_blank(input.referrer),
            visitor_hash: visitor_hash(client.ip.as_deref(), client.user_agent.as_deref()),
            user_agent: non_blank(client.user_agent),
            viewed_at: Utc::now(),
        };
        Ok(self
            .repo
            .record(&view)
            .await
            .context("Failed to record page view")?)
    }

    /// Totals for the last `days` days, today included
    pub async fn summary(&self, days: u32) -> Result<AnalyticsSummary, AnalyticsServiceError> {
        if !(1..=MAX_SUMMARY_DAYS).contains(&days) {
            return Err(AnalyticsServiceError::ValidationError(format!(
                "days must be between 1 and {}",
                MAX_SUMMARY_DAYS
            )));
        }
        let since = Utc::now().date_naive() - Duration::days(i64::from(days) - 1);

        Ok(AnalyticsSummary {
            days,
            total_views: self
                .repo
                .total_views(since)
                .await
                .context("Failed to count views")?,
            unique_visitors: self
                .repo
                .unique_visitors(since)
                .await
                .context("Failed to count visitors")?,
            daily: self
                .repo
                .daily_views(since)
                .await
                .context("Failed to aggregate daily views")?,
            top_paths: self
                .repo
                .top_paths(since, TOP_PATHS_LIMIT)
                .await
                .context("Failed to aggregate top paths")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::{
        SqlxAnalyticsRepository, SqlxAuthorRepository, SqlxCategoryRepository,
        SqlxPostRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::CreatePostInput;
    use crate::services::post::PostService;
    use proptest::prelude::*;

    async fn setup() -> (AnalyticsService, PostService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let posts = SqlxPostRepository::boxed(pool.clone());
        let post_service = PostService::new(
            posts.clone(),
            SqlxCategoryRepository::boxed(pool.clone()),
            SqlxAuthorRepository::boxed(pool.clone()),
            create_cache(&CacheConfig::default()),
        );
        (
            AnalyticsService::new(SqlxAnalyticsRepository::boxed(pool), posts),
            post_service,
        )
    }

    fn visitor(ip: &str) -> ClientInfo {
        ClientInfo {
            ip: Some(ip.to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        }
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("blog/post/"), "/blog/post");
        assert_eq!(normalize_path("/services?ref=x#top"), "/services");
        assert_eq!(normalize_path("  /about/  "), "/about");
    }

    #[test]
    fn test_visitor_hash() {
        let a = visitor_hash(Some("1.2.3.4"), Some("ua"));
        assert_eq!(a.len(), 64);
        assert_eq!(a, visitor_hash(Some("1.2.3.4"), Some("ua")));
        assert_ne!(a, visitor_hash(Some("1.2.3.4"), Some("other")));
        // Field boundary is part of the digest
        assert_ne!(
            visitor_hash(Some("1.2.3.4"), Some("5x")),
            visitor_hash(Some("1.2.3.45"), Some("x"))
        );
    }

    #[tokio::test]
    async fn test_record_view_links_published_post() {
        let (analytics, posts) = setup().await;
        let published = posts
            .create(CreatePostInput::new("Live", "x").with_status(PostStatus::Published))
            .await
            .unwrap();
        let draft = posts.create(CreatePostInput::new("Hidden", "x")).await.unwrap();

        analytics
            .record_view(
                RecordViewInput::new("/blog/live/").with_post_slug("live"),
                visitor("1.1.1.1"),
            )
            .await
            .unwrap();
        analytics
            .record_view(
                RecordViewInput::new("/blog/hidden").with_post_slug("hidden"),
                visitor("1.1.1.1"),
            )
            .await
            .unwrap();
        analytics
            .record_view(
                RecordViewInput::new("/blog/gone").with_post_slug("gone"),
                visitor("2.2.2.2"),
            )
            .await
            .unwrap();

        assert_eq!(posts.get(published.id).await.unwrap().view_count, 1);
        assert_eq!(posts.get(draft.id).await.unwrap().view_count, 0);

        let summary = analytics.summary(7).await.unwrap();
        assert_eq!(summary.total_views, 3);
        assert_eq!(summary.unique_visitors, 2);
        assert_eq!(summary.daily.len(), 1);
        assert!(summary.top_paths.iter().any(|p| p.path == "/blog/live"));
    }

    #[tokio::test]
    async fn test_validation() {
        let (analytics, _) = setup().await;
        assert!(matches!(
            analytics
                .record_view(RecordViewInput::new("  "), ClientInfo::default())
                .await,
            Err(AnalyticsServiceError::ValidationError(_))
        ));
        for days in [0, 366] {
            assert!(matches!(
                analytics.summary(days).await,
                Err(AnalyticsServiceError::ValidationError(_))
            ));
        }
        assert_eq!(analytics.summary(365).await.unwrap().total_views, 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_normalized_path_shape(raw in "[a-z/?#=]{0,30}") {
            let path = normalize_path(&raw);
            prop_assert!(path.starts_with('/'));
            prop_assert!(path == "/" || !path.ends_with('/'));
            prop_assert!(!path.contains('?') && !path.contains('#'));
            prop_assert_eq!(normalize_path(&path), path.clone());
        }
    }
}
