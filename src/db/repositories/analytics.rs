//! Analytics repository
//!
//! Stores page views and aggregates them per day and per path. Date ranges
//! use the `view_date` column (`YYYY-MM-DD`, UTC) so the same SQL works on
//! both backends.

use crate::db::{with_pool, DynDatabasePool, InsertId};
use crate::models::{DailyViews, NewPageView, PathViews};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    /// Store one page view, returning its id
    async fn record(&self, view: &NewPageView) -> Result<i64>;

    /// Views on or after `since`
    async fn total_views(&self, since: NaiveDate) -> Result<i64>;

    /// Distinct visitor hashes on or after `since`
    async fn unique_visitors(&self, since: NaiveDate) -> Result<i64>;

    /// Per-day totals on or after `since`, oldest first. Days without views
    /// are absent.
    async fn daily_views(&self, since: NaiveDate) -> Result<Vec<DailyViews>>;

    /// Most viewed paths on or after `since`
    async fn top_paths(&self, since: NaiveDate, limit: i64) -> Result<Vec<PathViews>>;
}

pub struct SqlxAnalyticsRepository {
    pool: DynDatabasePool,
}

impl SqlxAnalyticsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AnalyticsRepository> {
        Arc::new(Self::new(pool))
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[async_trait]
impl AnalyticsRepository for SqlxAnalyticsRepository {
    async fn record(&self, view: &NewPageView) -> Result<i64> {
        let view_date = view.view_date();
        let id = with_pool!(self.pool, |conn| {
            sqlx::query(
                r#"
                INSERT INTO analytics_views (path, post_id, referrer, user_agent, visitor_hash,
                                             view_date, viewed_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&view.path)
            .bind(view.post_id)
            .bind(&view.referrer)
            .bind(&view.user_agent)
            .bind(&view.visitor_hash)
            .bind(&view_date)
            .bind(view.viewed_at)
            .execute(conn)
            .await
            .context("Failed to record page view")?
            .insert_id()
        });
        Ok(id)
    }

    async fn total_views(&self, since: NaiveDate) -> Result<i64> {
        let since = date_key(since);
        let count: i64 = with_pool!(self.pool, |conn| {
            sqlx::query_scalar("SELECT COUNT(*) FROM analytics_views WHERE view_date >= ?")
                .bind(&since)
                .fetch_one(conn)
                .await
                .context("Failed to count page views")?
        });
        Ok(count)
    }

    async fn unique_visitors(&self, since: NaiveDate) -> Result<i64> {
        let since = date_key(since);
        let count: i64 = with_pool!(self.pool, |conn| {
            sqlx::query_scalar(
                "SELECT COUNT(DISTINCT visitor_hash) FROM analytics_views WHERE view_date >= ?",
            )
            .bind(&since)
            .fetch_one(conn)
            .await
            .context("Failed to count unique visitors")?
        });
        Ok(count)
    }

    async fn daily_views(&self, since: NaiveDate) -> Result<Vec<DailyViews>> {
        let since = date_key(since);
        let rows = with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, DailyViews>(
                r#"
                SELECT view_date, COUNT(*) AS views, COUNT(DISTINCT visitor_hash) AS visitors
                FROM analytics_views
                WHERE view_date >= ?
                GROUP BY view_date
                ORDER BY view_date ASC
                "#,
            )
            .bind(&since)
            .fetch_all(conn)
            .await
            .context("Failed to aggregate daily views")?
        });
        Ok(rows)
    }

    async fn top_paths(&self, since: NaiveDate, limit: i64) -> Result<Vec<PathViews>> {
        let since = date_key(since);
        let rows = with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, PathViews>(
                r#"
                SELECT path, COUNT(*) AS views
                FROM analytics_views
                WHERE view_date >= ?
                GROUP BY path
                ORDER BY views DESC, path ASC
                LIMIT ?
                "#,
            )
            .bind(&since)
            .bind(limit)
            .fetch_all(conn)
            .await
            .context("Failed to aggregate top paths")?
        });
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::{Duration, TimeZone, Utc};

    async fn setup_test_repo() -> SqlxAnalyticsRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxAnalyticsRepository::new(pool)
    }

    fn view(path: &str, visitor: &str, day: u32) -> NewPageView {
        NewPageView {
            path: path.to_string(),
            post_id: None,
            referrer: None,
            user_agent: None,
            visitor_hash: visitor.to_string(),
            viewed_at: Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[tokio::test]
    async fn test_aggregates() {
        let repo = setup_test_repo().await;
        repo.record(&view("/", "v1", 1)).await.unwrap();
        repo.record(&view("/", "v1", 2)).await.unwrap();
        repo.record(&view("/blog/a", "v2", 2)).await.unwrap();
        repo.record(&view("/", "v3", 3)).await.unwrap();

        assert_eq!(repo.total_views(day(1)).await.unwrap(), 4);
        assert_eq!(repo.total_views(day(2)).await.unwrap(), 3);
        assert_eq!(repo.unique_visitors(day(1)).await.unwrap(), 3);

        let daily = repo.daily_views(day(2)).await.unwrap();
        assert_eq!(
            daily,
            vec![
                DailyViews {
                    view_date: "2024-05-02".to_string(),
                    views: 2,
                    visitors: 2
                },
                DailyViews {
                    view_date: "2024-05-03".to_string(),
                    views: 1,
                    visitors: 1
                },
            ]
        );

        let top = repo.top_paths(day(1), 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].path, "/");
        assert_eq!(top[0].views, 3);
    }

    #[tokio::test]
    async fn test_empty_range() {
        let repo = setup_test_repo().await;
        repo.record(&view("/", "v1", 1)).await.unwrap();
        let later = (Utc::now() + Duration::days(1)).date_naive();
        assert_eq!(repo.total_views(later).await.unwrap(), 0);
        assert!(repo.daily_views(later).await.unwrap().is_empty());
    }
}
