//! Page view analytics models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded page view
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnalyticsView {
    pub id: i64,
    pub path: String,
    pub post_id: Option<i64>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    /// sha256(ip + user agent), hex
    pub visitor_hash: String,
    /// `YYYY-MM-DD` in UTC
    pub view_date: String,
    pub viewed_at: DateTime<Utc>,
}

/// A page view ready to be stored
#[derive(Debug, Clone)]
pub struct NewPageView {
    pub path: String,
    pub post_id: Option<i64>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub visitor_hash: String,
    pub viewed_at: DateTime<Utc>,
}

impl NewPageView {
    pub fn view_date(&self) -> String {
        self.viewed_at.format("%Y-%m-%d").to_string()
    }
}

/// Views and unique visitors for one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyViews {
    pub view_date: String,
    pub views: i64,
    pub visitors: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PathViews {
    pub path: String,
    pub views: i64,
}

/// Aggregate returned by the admin analytics screen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub days: u32,
    pub total_views: i64,
    pub unique_visitors: i64,
    pub daily: Vec<DailyViews>,
    pub top_paths: Vec<PathViews>,
}
