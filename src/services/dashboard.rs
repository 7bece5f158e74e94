//! Aggregate counts for the admin home screen

use crate::db::repositories::{
    AnalyticsRepository, ContactRepository, PostRepository, ServiceRepository, UserRepository,
};
use crate::models::{
    ContactFilter, ContactStatus, ContactSubmission, ListParams, Post, PostFilter, PostStatus,
};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Window used for the traffic figures
pub const TRAFFIC_DAYS: i64 = 30;
const RECENT_LIMIT: u32 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostCounts {
    pub total: i64,
    pub published: i64,
    pub draft: i64,
    pub archived: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub posts: PostCounts,
    pub active_services: i64,
    pub new_contacts: i64,
    pub total_contacts: i64,
    pub users: i64,
    pub views_30d: i64,
    pub visitors_30d: i64,
    pub recent_posts: Vec<Post>,
    pub recent_contacts: Vec<ContactSubmission>,
}

pub struct DashboardService {
    posts: Arc<dyn PostRepository>,
    services: Arc<dyn ServiceRepository>,
    contacts: Arc<dyn ContactRepository>,
    users: Arc<dyn UserRepository>,
    analytics: Arc<dyn AnalyticsRepository>,
}

impl DashboardService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        services: Arc<dyn ServiceRepository>,
        contacts: Arc<dyn ContactRepository>,
        users: Arc<dyn UserRepository>,
        analytics: Arc<dyn AnalyticsRepository>,
    ) -> Self {
        Self {
            posts,
            services,
            contacts,
            users,
            analytics,
        }
    }

    pub async fn stats(&self) -> Result<DashboardStats> {
        let (total, published, draft, archived) = futures::try_join!(
            self.count_posts(None),
            self.count_posts(Some(PostStatus::Published)),
            self.count_posts(Some(PostStatus::Draft)),
            self.count_posts(Some(PostStatus::Archived)),
        )?;
        let posts = PostCounts {
            total,
            published,
            draft,
            archived,
        };
        let since = Utc::now().date_naive() - Duration::days(TRAFFIC_DAYS - 1);
        let recent = ListParams::new(1, RECENT_LIMIT);

        let (recent_posts, _) = self
            .posts
            .list(&PostFilter::default(), &recent)
            .await
            .context("Failed to list recent posts")?;
        let new_filter = ContactFilter {
            status: Some(ContactStatus::New),
            ..Default::default()
        };
        let (recent_contacts, _) = self
            .contacts
            .list(&new_filter, &recent)
            .await
            .context("Failed to list recent contacts")?;

        Ok(DashboardStats {
            posts,
            active_services: self
                .services
                .count_active()
                .await
                .context("Failed to count services")?,
            new_contacts: self
                .contacts
                .count_by_status(Some(ContactStatus::New))
                .await
                .context("Failed to count contacts")?,
            total_contacts: self
                .contacts
                .count_by_status(None)
                .await
                .context("Failed to count contacts")?,
            users: self.users.count().await.context("Failed to count users")?,
            views_30d: self
                .analytics
                .total_views(since)
                .await
                .context("Failed to count views")?,
            visitors_30d: self
                .analytics
                .unique_visitors(since)
                .await
                .context("Failed to count visitors")?,
            recent_posts,
            recent_contacts,
        })
    }

    async fn count_posts(&self, status: Option<PostStatus>) -> Result<i64> {
        self.posts
            .count_by_status(status)
            .await
            .context("Failed to count posts")
    }
}
