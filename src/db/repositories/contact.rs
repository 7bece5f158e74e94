//! Contact submission repository

use super::search_pattern;
use crate::db::{with_pool, DynDatabasePool, InsertId};
use crate::models::{ContactFilter, ContactStatus, ContactSubmission, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const SELECT_CONTACT: &str = "SELECT id, name, email, phone, company, subject, message, \
     service_interest, status, ip_hash, user_agent, created_at, updated_at FROM contact_submissions";

#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn create(&self, submission: &ContactSubmission) -> Result<ContactSubmission>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ContactSubmission>>;

    /// Newest first, plus the total match count
    async fn list(
        &self,
        filter: &ContactFilter,
        params: &ListParams,
    ) -> Result<(Vec<ContactSubmission>, i64)>;

    /// Returns whether a row was updated
    async fn update_status(&self, id: i64, status: ContactStatus) -> Result<bool>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Number of submissions in `status`, or all when `None`
    async fn count_by_status(&self, status: Option<ContactStatus>) -> Result<i64>;

    /// Submissions from one IP hash at or after `since`
    async fn count_recent_from(&self, ip_hash: &str, since: DateTime<Utc>) -> Result<i64>;
}

pub struct SqlxContactRepository {
    pool: DynDatabasePool,
}

impl SqlxContactRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContactRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ContactRepository for SqlxContactRepository {
    async fn create(&self, submission: &ContactSubmission) -> Result<ContactSubmission> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |conn| {
            sqlx::query(
                r#"
                INSERT INTO contact_submissions (name, email, phone, company, subject, message,
                                                 service_interest, status, ip_hash, user_agent,
                                                 created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&submission.name)
            .bind(&submission.email)
            .bind(&submission.phone)
            .bind(&submission.company)
            .bind(&submission.subject)
            .bind(&submission.message)
            .bind(&submission.service_interest)
            .bind(submission.status.as_str())
            .bind(&submission.ip_hash)
            .bind(&submission.user_agent)
            .bind(now)
            .bind(now)
            .execute(conn)
            .await
            .context("Failed to create contact submission")?
            .insert_id()
        });

        Ok(ContactSubmission {
            id,
            created_at: now,
            updated_at: now,
            ..submission.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ContactSubmission>> {
        let sql = format!("{SELECT_CONTACT} WHERE id = ?");
        let submission = with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, ContactSubmission>(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get contact submission")?
        });
        Ok(submission)
    }

    async fn list(
        &self,
        filter: &ContactFilter,
        params: &ListParams,
    ) -> Result<(Vec<ContactSubmission>, i64)> {
        let status = filter.status.map(|s| s.as_str());
        let search = search_pattern(filter.search.as_deref());
        let where_clause = r#"
            WHERE (? IS NULL OR status = ?)
              AND (? IS NULL OR LOWER(name) LIKE ? OR LOWER(email) LIKE ? OR LOWER(message) LIKE ?)
        "#;
        let count_sql = format!("SELECT COUNT(*) FROM contact_submissions {where_clause}");
        let list_sql = format!(
            "{SELECT_CONTACT} {where_clause} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );

        let (items, total) = with_pool!(self.pool, |conn| {
            let total: i64 = sqlx::query_scalar(&count_sql)
                .bind(status)
                .bind(status)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .fetch_one(conn)
                .await
                .context("Failed to count contact submissions")?;

            let items = sqlx::query_as::<_, ContactSubmission>(&list_sql)
                .bind(status)
                .bind(status)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(conn)
                .await
                .context("Failed to list contact submissions")?;

            (items, total)
        });

        Ok((items, total))
    }

    async fn update_status(&self, id: i64, status: ContactStatus) -> Result<bool> {
        let now = Utc::now();
        let affected = with_pool!(self.pool, |conn| {
            sqlx::query("UPDATE contact_submissions SET status = ?, updated_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(now)
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to update contact status")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |conn| {
            sqlx::query("DELETE FROM contact_submissions WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete contact submission")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn count_by_status(&self, status: Option<ContactStatus>) -> Result<i64> {
        let status = status.map(|s| s.as_str());
        let count: i64 = with_pool!(self.pool, |conn| {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM contact_submissions WHERE (? IS NULL OR status = ?)",
            )
            .bind(status)
            .bind(status)
            .fetch_one(conn)
            .await
            .context("Failed to count contact submissions")?
        });
        Ok(count)
    }

    async fn count_recent_from(&self, ip_hash: &str, since: DateTime<Utc>) -> Result<i64> {
        let count: i64 = with_pool!(self.pool, |conn| {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM contact_submissions WHERE ip_hash = ? AND created_at >= ?",
            )
            .bind(ip_hash)
            .bind(since)
            .fetch_one(conn)
            .await
            .context("Failed to count recent contact submissions")?
        });
        Ok(count)
    }
}
