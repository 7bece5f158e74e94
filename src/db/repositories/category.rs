//! Category repository
//!
//! Database operations for blog categories.
//!
//! This module provides:
//! - `CategoryRepository` trait defining the interface for category data access
//! - `SqlxCategoryRepository` implementing the trait for SQLite and MySQL

use super::search_pattern;
use crate::db::{with_pool, DynDatabasePool, InsertId};
use crate::models::{Category, CategoryFilter, CategoryWithCount, ListParams, PostStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const SELECT_CATEGORY: &str =
    "SELECT id, name, slug, description, created_at, updated_at FROM categories";

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a new category
    async fn create(&self, category: &Category) -> Result<Category>;

    /// Get category by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    /// Get category by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// Check whether a slug is taken, ignoring the row `exclude_id`
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// All categories ordered by name, with the number of posts in each.
    /// When `status` is set only posts in that state are counted.
    async fn list_with_counts(&self, status: Option<PostStatus>)
        -> Result<Vec<CategoryWithCount>>;

    /// One page of categories with their total post counts
    async fn list(
        &self,
        filter: &CategoryFilter,
        params: &ListParams,
    ) -> Result<(Vec<CategoryWithCount>, i64)>;

    /// Update a category
    async fn update(&self, category: &Category) -> Result<Category>;

    /// Delete a category, returning whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |conn| {
            sqlx::query(
                r#"
                INSERT INTO categories (name, slug, description, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .bind(now)
            .bind(now)
            .execute(conn)
            .await
            .context("Failed to create category")?
            .insert_id()
        });

        Ok(Category {
            id,
            created_at: now,
            updated_at: now,
            ..category.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let sql = format!("{SELECT_CATEGORY} WHERE id = ?");
        let category = with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Category>(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get category by ID")?
        });
        Ok(category)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let sql = format!("{SELECT_CATEGORY} WHERE slug = ?");
        let category = with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Category>(&sql)
                .bind(slug)
                .fetch_optional(conn)
                .await
                .context("Failed to get category by slug")?
        });
        Ok(category)
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = with_pool!(self.pool, |conn| {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM categories WHERE slug = ? AND (? IS NULL OR id <> ?)",
            )
            .bind(slug)
            .bind(exclude_id)
            .bind(exclude_id)
            .fetch_one(conn)
            .await
            .context("Failed to check category slug existence")?
        });
        Ok(count > 0)
    }

    async fn list_with_counts(
        &self,
        status: Option<PostStatus>,
    ) -> Result<Vec<CategoryWithCount>> {
        let status = status.map(|s| s.as_str());
        let categories = with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, CategoryWithCount>(
                r#"
                SELECT c.id, c.name, c.slug, c.description, c.created_at, c.updated_at,
                       COUNT(p.id) AS post_count
                FROM categories c
                LEFT JOIN posts p ON p.category_id = c.id AND (? IS NULL OR p.status = ?)
                GROUP BY c.id, c.name, c.slug, c.description, c.created_at, c.updated_at
                ORDER BY c.name ASC, c.id ASC
                "#,
            )
            .bind(status)
            .bind(status)
            .fetch_all(conn)
            .await
            .context("Failed to list categories")?
        });
        Ok(categories)
    }

    async fn list(
        &self,
        filter: &CategoryFilter,
        params: &ListParams,
    ) -> Result<(Vec<CategoryWithCount>, i64)> {
        let search = search_pattern(filter.search.as_deref());
        let where_clause = "WHERE (? IS NULL OR LOWER(c.name) LIKE ? OR LOWER(c.slug) LIKE ?)";
        let count_sql = format!("SELECT COUNT(*) FROM categories c {where_clause}");
        let list_sql = format!(
            r#"
            SELECT c.id, c.name, c.slug, c.description, c.created_at, c.updated_at,
                   COUNT(p.id) AS post_count
            FROM categories c
            LEFT JOIN posts p ON p.category_id = c.id
            {where_clause}
            GROUP BY c.id, c.name, c.slug, c.description, c.created_at, c.updated_at
            ORDER BY {}
            LIMIT ? OFFSET ?
            "#,
            filter.sort.order_by()
        );

        let (categories, total) = with_pool!(self.pool, |conn| {
            let total: i64 = sqlx::query_scalar(&count_sql)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .fetch_one(conn)
                .await
                .context("Failed to count categories")?;

            let categories = sqlx::query_as::<_, CategoryWithCount>(&list_sql)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(conn)
                .await
                .context("Failed to list categories")?;

            (categories, total)
        });

        Ok((categories, total))
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        let now = Utc::now();
        with_pool!(self.pool, |conn| {
            sqlx::query(
                r#"
                UPDATE categories
                SET name = ?, slug = ?, description = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .bind(now)
            .bind(category.id)
            .execute(conn)
            .await
            .context("Failed to update category")?;
        });

        self.get_by_id(category.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Category not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |conn| {
            sqlx::query("DELETE FROM categories WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete category")?
                .rows_affected()
        });
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::CategorySort;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxCategoryRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxCategoryRepository::new(pool.clone());
        (pool, repo)
    }

    fn test_category(slug: &str, name: &str) -> Category {
        let now = Utc::now();
        Category {
            id: 0,
            name: name.to_string(),
            slug: slug.to_string(),
            description: Some(format!("About {}", name)),
            created_at: now,
            updated_at: now,
        }
    }

    async fn insert_post(pool: &DynDatabasePool, slug: &str, category_id: i64, status: &str) {
        let conn = pool.as_sqlite().unwrap();
        sqlx::query(
            "INSERT INTO posts (title, slug, content, content_html, category_id, status, tags, created_at, updated_at) \
             VALUES (?, ?, '', '', ?, ?, '', ?, ?)",
        )
        .bind(slug)
        .bind(slug)
        .bind(category_id)
        .bind(status)
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(conn)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo.create(&test_category("design", "Design")).await.unwrap();
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.slug, "design");
        let by_slug = repo.get_by_slug("design").await.unwrap().unwrap();
        assert_eq!(by_slug.id, created.id);
        assert!(repo.get_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exists_by_slug_excludes_self() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo.create(&test_category("seo", "SEO")).await.unwrap();

        assert!(repo.exists_by_slug("seo", None).await.unwrap());
        assert!(!repo.exists_by_slug("seo", Some(created.id)).await.unwrap());
        assert!(!repo.exists_by_slug("other", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected_by_schema() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&test_category("dup", "One")).await.unwrap();
        assert!(repo.create(&test_category("dup", "Two")).await.is_err());
    }

    #[tokio::test]
    async fn test_list_with_counts() {
        let (pool, repo) = setup_test_repo().await;
        let news = repo.create(&test_category("news", "News")).await.unwrap();
        repo.create(&test_category("empty", "Empty")).await.unwrap();
        insert_post(&pool, "a", news.id, "published").await;
        insert_post(&pool, "b", news.id, "draft").await;

        let all = repo.list_with_counts(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].category.name, "Empty");
        assert_eq!(all[0].post_count, 0);
        assert_eq!(all[1].post_count, 2);

        let published = repo
            .list_with_counts(Some(PostStatus::Published))
            .await
            .unwrap();
        assert_eq!(published[1].post_count, 1);
    }

    #[tokio::test]
    async fn test_list_pages_searches_and_sorts() {
        let (pool, repo) = setup_test_repo().await;
        let news = repo.create(&test_category("news", "News")).await.unwrap();
        repo.create(&test_category("design", "Design")).await.unwrap();
        repo.create(&test_category("news-archive", "Archive")).await.unwrap();
        insert_post(&pool, "a", news.id, "published").await;
        insert_post(&pool, "b", news.id, "draft").await;

        let (page, total) = repo
            .list(&CategoryFilter::default(), &ListParams::new(1, 2))
            .await
            .unwrap();
        assert_eq!(total, 3);
        let names: Vec<_> = page.iter().map(|c| c.category.name.as_str()).collect();
        assert_eq!(names, ["Archive", "Design"]);

        let (page, total) = repo
            .list(&CategoryFilter::default(), &ListParams::new(2, 2))
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page[0].category.name, "News");
        assert_eq!(page[0].post_count, 2);

        let filter = CategoryFilter {
            search: Some("NEWS".to_string()),
            sort: CategorySort::MostPosts,
        };
        let (page, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page[0].category.slug, "news");
        assert_eq!(page[1].category.slug, "news-archive");
        assert_eq!(page[1].post_count, 0);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_pool, repo) = setup_test_repo().await;
        let mut category = repo.create(&test_category("old", "Old")).await.unwrap();
        category.name = "New".to_string();
        category.slug = "new".to_string();
        category.description = None;

        let updated = repo.update(&category).await.unwrap();
        assert_eq!(updated.slug, "new");
        assert!(updated.description.is_none());

        assert!(repo.delete(category.id).await.unwrap());
        assert!(!repo.delete(category.id).await.unwrap());
        assert!(repo.get_by_id(category.id).await.unwrap().is_none());
    }
}
