//! Author repository
//!
//! Database operations for post bylines.

use super::search_pattern;
use crate::db::{with_pool, DynDatabasePool, InsertId};
use crate::models::{Author, AuthorFilter, AuthorWithCount, ListParams, PostStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const SELECT_AUTHOR: &str = "SELECT id, name, slug, email, title, bio, avatar_url, twitter, \
     linkedin, created_at, updated_at FROM authors";

/// Author repository trait
#[async_trait]
pub trait AuthorRepository: Send + Sync {
    async fn create(&self, author: &Author) -> Result<Author>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Author>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Author>>;

    /// Check whether a slug is taken, ignoring the row `exclude_id`
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// All authors ordered by name, with the number of bylined posts.
    /// When `status` is set only posts in that state are counted.
    async fn list_with_counts(&self, status: Option<PostStatus>) -> Result<Vec<AuthorWithCount>>;

    /// One page of authors with their total post counts
    async fn list(&self, filter: &AuthorFilter, params: &ListParams)
        -> Result<(Vec<AuthorWithCount>, i64)>;

    async fn update(&self, author: &Author) -> Result<Author>;

    /// Delete an author, returning whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based author repository implementation
pub struct SqlxAuthorRepository {
    pool: DynDatabasePool,
}

impl SqlxAuthorRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AuthorRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AuthorRepository for SqlxAuthorRepository {
    async fn create(&self, author: &Author) -> Result<Author> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |conn| {
            sqlx::query(
                r#"
                INSERT INTO authors (name, slug, email, title, bio, avatar_url, twitter, linkedin,
                                     created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&author.name)
            .bind(&author.slug)
            .bind(&author.email)
            .bind(&author.title)
            .bind(&author.bio)
            .bind(&author.avatar_url)
            .bind(&author.twitter)
            .bind(&author.linkedin)
            .bind(now)
            .bind(now)
            .execute(conn)
            .await
            .context("Failed to create author")?
            .insert_id()
        });

        Ok(Author {
            id,
            created_at: now,
            updated_at: now,
            ..author.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Author>> {
        let sql = format!("{SELECT_AUTHOR} WHERE id = ?");
        let author = with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Author>(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get author by ID")?
        });
        Ok(author)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Author>> {
        let sql = format!("{SELECT_AUTHOR} WHERE slug = ?");
        let author = with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Author>(&sql)
                .bind(slug)
                .fetch_optional(conn)
                .await
                .context("Failed to get author by slug")?
        });
        Ok(author)
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = with_pool!(self.pool, |conn| {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM authors WHERE slug = ? AND (? IS NULL OR id <> ?)",
            )
            .bind(slug)
            .bind(exclude_id)
            .bind(exclude_id)
            .fetch_one(conn)
            .await
            .context("Failed to check author slug existence")?
        });
        Ok(count > 0)
    }

    async fn list_with_counts(&self, status: Option<PostStatus>) -> Result<Vec<AuthorWithCount>> {
        let status = status.map(|s| s.as_str());
        let authors = with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, AuthorWithCount>(
                r#"
                SELECT a.id, a.name, a.slug, a.email, a.title, a.bio, a.avatar_url, a.twitter,
                       a.linkedin, a.created_at, a.updated_at, COUNT(p.id) AS post_count
                FROM authors a
                LEFT JOIN posts p ON p.author_id = a.id AND (? IS NULL OR p.status = ?)
                GROUP BY a.id, a.name, a.slug, a.email, a.title, a.bio, a.avatar_url, a.twitter,
                         a.linkedin, a.created_at, a.updated_at
                ORDER BY a.name ASC, a.id ASC
                "#,
            )
            .bind(status)
            .bind(status)
            .fetch_all(conn)
            .await
            .context("Failed to list authors")?
        });
        Ok(authors)
    }

    async fn list(
        &self,
        filter: &AuthorFilter,
        params: &ListParams,
    ) -> Result<(Vec<AuthorWithCount>, i64)> {
        let search = search_pattern(filter.search.as_deref());
        let where_clause = "WHERE (? IS NULL OR LOWER(a.name) LIKE ? OR LOWER(a.email) LIKE ?)";
        let count_sql = format!("SELECT COUNT(*) FROM authors a {where_clause}");
        let list_sql = format!(
            r#"
            SELECT a.id, a.name, a.slug, a.email, a.title, a.bio, a.avatar_url, a.twitter,
                   a.linkedin, a.created_at, a.updated_at, COUNT(p.id) AS post_count
            FROM authors a
            LEFT JOIN posts p ON p.author_id = a.id
            {where_clause}
            GROUP BY a.id, a.name, a.slug, a.email, a.title, a.bio, a.avatar_url, a.twitter,
                     a.linkedin, a.created_at, a.updated_at
            ORDER BY {}
            LIMIT ? OFFSET ?
            "#,
            filter.sort.order_by()
        );

        let (authors, total) = with_pool!(self.pool, |conn| {
            let total: i64 = sqlx::query_scalar(&count_sql)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .fetch_one(conn)
                .await
                .context("Failed to count authors")?;

            let authors = sqlx::query_as::<_, AuthorWithCount>(&list_sql)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(conn)
                .await
                .context("Failed to list authors")?;

            (authors, total)
        });

        Ok((authors, total))
    }

    async fn update(&self, author: &Author) -> Result<Author> {
        let now = Utc::now();
        with_pool!(self.pool, |conn| {
            sqlx::query(
                r#"
                UPDATE authors
                SET name = ?, slug = ?, email = ?, title = ?, bio = ?, avatar_url = ?,
                    twitter = ?, linkedin = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&author.name)
            .bind(&author.slug)
            .bind(&author.email)
            .bind(&author.title)
            .bind(&author.bio)
            .bind(&author.avatar_url)
            .bind(&author.twitter)
            .bind(&author.linkedin)
            .bind(now)
            .bind(author.id)
            .execute(conn)
            .await
            .context("Failed to update author")?;
        });

        self.get_by_id(author.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Author not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |conn| {
            sqlx::query("DELETE FROM authors WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete author")?
                .rows_affected()
        });
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::AuthorSort;

    async fn setup_test_repo() -> SqlxAuthorRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxAuthorRepository::new(pool)
    }

    fn test_author(slug: &str, name: &str) -> Author {
        let now = Utc::now();
        Author {
            id: 0,
            name: name.to_string(),
            slug: slug.to_string(),
            email: None,
            title: Some("Editor".to_string()),
            bio: None,
            avatar_url: None,
            twitter: Some("@handle".to_string()),
            linkedin: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_crud() {
        let repo = setup_test_repo().await;
        let created = repo.create(&test_author("jane", "Jane")).await.unwrap();
        assert!(created.id > 0);

        let mut author = repo.get_by_slug("jane").await.unwrap().unwrap();
        assert_eq!(author.twitter.as_deref(), Some("@handle"));

        author.bio = Some("Writes about design".to_string());
        let updated = repo.update(&author).await.unwrap();
        assert_eq!(updated.bio.as_deref(), Some("Writes about design"));

        assert!(repo.delete(author.id).await.unwrap());
        assert!(repo.get_by_id(author.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_with_counts_orders_by_name() {
        let repo = setup_test_repo().await;
        repo.create(&test_author("zed", "Zed")).await.unwrap();
        repo.create(&test_author("amy", "Amy")).await.unwrap();

        let authors = repo.list_with_counts(None).await.unwrap();
        let names: Vec<_> = authors.iter().map(|a| a.author.name.as_str()).collect();
        assert_eq!(names, vec!["Amy", "Zed"]);
        assert!(authors.iter().all(|a| a.post_count == 0));
    }

    #[tokio::test]
    async fn test_list_searches_email_and_pages() {
        let repo = setup_test_repo().await;
        let mut jo = test_author("jo", "Jo");
        jo.email = Some("jo@studio.test".to_string());
        repo.create(&jo).await.unwrap();
        repo.create(&test_author("amy", "Amy")).await.unwrap();
        repo.create(&test_author("zed", "Zed")).await.unwrap();

        let filter = AuthorFilter {
            search: Some("studio".to_string()),
            ..Default::default()
        };
        let (found, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].author.slug, "jo");

        let filter = AuthorFilter {
            sort: AuthorSort::Newest,
            ..Default::default()
        };
        let (page, total) = repo.list(&filter, &ListParams::new(1, 2)).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].author.name, "Zed");
    }

    #[tokio::test]
    async fn test_exists_by_slug() {
        let repo = setup_test_repo().await;
        let author = repo.create(&test_author("sam", "Sam")).await.unwrap();
        assert!(repo.exists_by_slug("sam", None).await.unwrap());
        assert!(!repo.exists_by_slug("sam", Some(author.id)).await.unwrap());
    }
}
