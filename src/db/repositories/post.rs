//! Post repository
//!
//! Database operations for blog posts.
//!
//! This module provides:
//! - `PostRepository` trait defining the interface for post data access
//! - `SqlxPostRepository` implementing the trait for SQLite and MySQL
//!
//! Listing filters are static SQL guarded with `(? IS NULL OR ...)`, so each
//! filter is bound twice. Sort orders come from the `PostSort` whitelist.

use super::search_pattern;
use crate::db::{with_pool, DynDatabasePool, InsertId};
use crate::models::{ListParams, Post, PostFilter, PostStatus, TextList};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const SELECT_POST: &str = "SELECT id, title, slug, excerpt, content, content_html, cover_image, \
     category_id, author_id, status, featured, tags, reading_time_minutes, seo_title, \
     seo_description, view_count, published_at, created_at, updated_at FROM posts";

const FILTER_CLAUSE: &str = r#"
    WHERE (? IS NULL OR status = ?)
      AND (? IS NULL OR category_id = ?)
      AND (? IS NULL OR author_id = ?)
      AND (? IS NULL OR featured = ?)
      AND (? IS NULL OR LOWER(title) LIKE ? OR LOWER(excerpt) LIKE ?)
      AND (? IS NULL OR tags LIKE ?)
"#;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post. `id`, `view_count` and timestamps other than
    /// `published_at` are assigned here.
    async fn create(&self, post: &Post) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    /// Check whether a slug is taken, ignoring the row `exclude_id`
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// One page of posts matching `filter`, plus the total match count
    async fn list(&self, filter: &PostFilter, params: &ListParams) -> Result<(Vec<Post>, i64)>;

    /// Persist every editable column of `post`
    async fn update(&self, post: &Post) -> Result<Post>;

    /// Delete a post, returning whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn increment_view_count(&self, id: i64) -> Result<()>;

    /// Number of posts in `status`, or all posts when `None`
    async fn count_by_status(&self, status: Option<PostStatus>) -> Result<i64>;

    async fn count_by_category(&self, category_id: i64) -> Result<i64>;

    async fn count_by_author(&self, author_id: i64) -> Result<i64>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post) -> Result<Post> {
        let now = Utc::now();
        let tags = post.tags.to_db();
        let id = with_pool!(self.pool, |conn| {
            sqlx::query(
                r#"
                INSERT INTO posts (title, slug, excerpt, content, content_html, cover_image,
                                   category_id, author_id, status, featured, tags,
                                   reading_time_minutes, seo_title, seo_description, view_count,
                                   published_at, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
                "#,
            )
            .bind(&post.title)
            .bind(&post.slug)
            .bind(&post.excerpt)
            .bind(&post.content)
            .bind(&post.content_html)
            .bind(&post.cover_image)
            .bind(post.category_id)
            .bind(post.author_id)
            .bind(post.status.as_str())
            .bind(post.featured)
            .bind(&tags)
            .bind(post.reading_time_minutes)
            .bind(&post.seo_title)
            .bind(&post.seo_description)
            .bind(post.published_at)
            .bind(now)
            .bind(now)
            .execute(conn)
            .await
            .context("Failed to create post")?
            .insert_id()
        });

        Ok(Post {
            id,
            view_count: 0,
            created_at: now,
            updated_at: now,
            ..post.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("{SELECT_POST} WHERE id = ?");
        let post = with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Post>(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get post by ID")?
        });
        Ok(post)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let sql = format!("{SELECT_POST} WHERE slug = ?");
        let post = with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Post>(&sql)
                .bind(slug)
                .fetch_optional(conn)
                .await
                .context("Failed to get post by slug")?
        });
        Ok(post)
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = with_pool!(self.pool, |conn| {
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE slug = ? AND (? IS NULL OR id <> ?)")
                .bind(slug)
                .bind(exclude_id)
                .bind(exclude_id)
                .fetch_one(conn)
                .await
                .context("Failed to check post slug existence")?
        });
        Ok(count > 0)
    }

    async fn list(&self, filter: &PostFilter, params: &ListParams) -> Result<(Vec<Post>, i64)> {
        let status = filter.status.map(|s| s.as_str());
        let search = search_pattern(filter.search.as_deref());
        let tag = filter
            .tag
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(TextList::like_pattern);

        let count_sql = format!("SELECT COUNT(*) FROM posts {FILTER_CLAUSE}");
        let list_sql = format!(
            "{SELECT_POST} {FILTER_CLAUSE} ORDER BY {} LIMIT ? OFFSET ?",
            filter.sort.order_by()
        );

        let (posts, total) = with_pool!(self.pool, |conn| {
            let total: i64 = sqlx::query_scalar(&count_sql)
                .bind(status)
                .bind(status)
                .bind(filter.category_id)
                .bind(filter.category_id)
                .bind(filter.author_id)
                .bind(filter.author_id)
                .bind(filter.featured)
                .bind(filter.featured)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .bind(&tag)
                .bind(&tag)
                .fetch_one(conn)
                .await
                .context("Failed to count posts")?;

            let posts = sqlx::query_as::<_, Post>(&list_sql)
                .bind(status)
                .bind(status)
                .bind(filter.category_id)
                .bind(filter.category_id)
                .bind(filter.author_id)
                .bind(filter.author_id)
                .bind(filter.featured)
                .bind(filter.featured)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .bind(&tag)
                .bind(&tag)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(conn)
                .await
                .context("Failed to list posts")?;

            (posts, total)
        });

        Ok((posts, total))
    }

    async fn update(&self, post: &Post) -> Result<Post> {
        let now = Utc::now();
        let tags = post.tags.to_db();
        with_pool!(self.pool, |conn| {
            sqlx::query(
                r#"
                UPDATE posts
                SET title = ?, slug = ?, excerpt = ?, content = ?, content_html = ?,
                    cover_image = ?, category_id = ?, author_id = ?, status = ?, featured = ?,
                    tags = ?, reading_time_minutes = ?, seo_title = ?, seo_description = ?,
                    published_at = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&post.title)
            .bind(&post.slug)
            .bind(&post.excerpt)
            .bind(&post.content)
            .bind(&post.content_html)
            .bind(&post.cover_image)
            .bind(post.category_id)
            .bind(post.author_id)
            .bind(post.status.as_str())
            .bind(post.featured)
            .bind(&tags)
            .bind(post.reading_time_minutes)
            .bind(&post.seo_title)
            .bind(&post.seo_description)
            .bind(post.published_at)
            .bind(now)
            .bind(post.id)
            .execute(conn)
            .await
            .context("Failed to update post")?;
        });

        self.get_by_id(post.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |conn| {
            sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete post")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn increment_view_count(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |conn| {
            sqlx::query("UPDATE posts SET view_count = view_count + 1 WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to increment view count")?;
        });
        Ok(())
    }

    async fn count_by_status(&self, status: Option<PostStatus>) -> Result<i64> {
        let status = status.map(|s| s.as_str());
        let count: i64 = with_pool!(self.pool, |conn| {
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE (? IS NULL OR status = ?)")
                .bind(status)
                .bind(status)
                .fetch_one(conn)
                .await
                .context("Failed to count posts by status")?
        });
        Ok(count)
    }

    async fn count_by_category(&self, category_id: i64) -> Result<i64> {
        let count: i64 = with_pool!(self.pool, |conn| {
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE category_id = ?")
                .bind(category_id)
                .fetch_one(conn)
                .await
                .context("Failed to count posts by category")?
        });
        Ok(count)
    }

    async fn count_by_author(&self, author_id: i64) -> Result<i64> {
        let count: i64 = with_pool!(self.pool, |conn| {
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = ?")
                .bind(author_id)
                .fetch_one(conn)
                .await
                .context("Failed to count posts by author")?
        });
        Ok(count)
    }
}
