//! Service repository
//!
//! Database operations for the business's service offerings.

use super::search_pattern;
use crate::db::{with_pool, DynDatabasePool, InsertId};
use crate::models::{ListParams, Service, ServiceFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const SELECT_SERVICE: &str = "SELECT id, title, slug, summary, description, description_html, \
     icon, image_url, features, price_from, sort_order, is_active, seo_title, seo_description, \
     created_at, updated_at FROM services";

/// Service repository trait
#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn create(&self, service: &Service) -> Result<Service>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Service>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Service>>;

    /// Check whether a slug is taken, ignoring the row `exclude_id`
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// One page of services in display order, plus the total match count
    async fn list(&self, filter: &ServiceFilter, params: &ListParams)
        -> Result<(Vec<Service>, i64)>;

    /// Every active service in display order
    async fn list_active(&self) -> Result<Vec<Service>>;

    async fn update(&self, service: &Service) -> Result<Service>;

    /// Delete a service, returning whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Give `ids[i]` position `i`, all in one transaction
    async fn reorder(&self, ids: &[i64]) -> Result<()>;

    /// Position after the current last service
    async fn next_sort_order(&self) -> Result<i32>;

    async fn count_active(&self) -> Result<i64>;
}

/// SQLx-based service repository implementation
pub struct SqlxServiceRepository {
    pool: DynDatabasePool,
}

impl SqlxServiceRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ServiceRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ServiceRepository for SqlxServiceRepository {
    async fn create(&self, service: &Service) -> Result<Service> {
        let now = Utc::now();
        let features = service.features.to_db();
        let id = with_pool!(self.pool, |conn| {
            sqlx::query(
                r#"
                INSERT INTO services (title, slug, summary, description, description_html, icon,
                                      image_url, features, price_from, sort_order, is_active,
                                      seo_title, seo_description, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&service.title)
            .bind(&service.slug)
            .bind(&service.summary)
            .bind(&service.description)
            .bind(&service.description_html)
            .bind(&service.icon)
            .bind(&service.image_url)
            .bind(&features)
            .bind(&service.price_from)
            .bind(service.sort_order)
            .bind(service.is_active)
            .bind(&service.seo_title)
            .bind(&service.seo_description)
            .bind(now)
            .bind(now)
            .execute(conn)
            .await
            .context("Failed to create service")?
            .insert_id()
        });

        Ok(Service {
            id,
            created_at: now,
            updated_at: now,
            ..service.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Service>> {
        let sql = format!("{SELECT_SERVICE} WHERE id = ?");
        let service = with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Service>(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get service by ID")?
        });
        Ok(service)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Service>> {
        let sql = format!("{SELECT_SERVICE} WHERE slug = ?");
        let service = with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Service>(&sql)
                .bind(slug)
                .fetch_optional(conn)
                .await
                .context("Failed to get service by slug")?
        });
        Ok(service)
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = with_pool!(self.pool, |conn| {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM services WHERE slug = ? AND (? IS NULL OR id <> ?)",
            )
            .bind(slug)
            .bind(exclude_id)
            .bind(exclude_id)
            .fetch_one(conn)
            .await
            .context("Failed to check service slug existence")?
        });
        Ok(count > 0)
    }

    async fn list(
        &self,
        filter: &ServiceFilter,
        params: &ListParams,
    ) -> Result<(Vec<Service>, i64)> {
        let search = search_pattern(filter.search.as_deref());
        let where_clause = r#"
            WHERE (? IS NULL OR is_active = ?)
              AND (? IS NULL OR LOWER(title) LIKE ? OR LOWER(summary) LIKE ?)
        "#;
        let count_sql = format!("SELECT COUNT(*) FROM services {where_clause}");
        let list_sql = format!(
            "{SELECT_SERVICE} {where_clause} ORDER BY {} LIMIT ? OFFSET ?",
            filter.sort.order_by()
        );

        let (services, total) = with_pool!(self.pool, |conn| {
            let total: i64 = sqlx::query_scalar(&count_sql)
                .bind(filter.active)
                .bind(filter.active)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .fetch_one(conn)
                .await
                .context("Failed to count services")?;

            let services = sqlx::query_as::<_, Service>(&list_sql)
                .bind(filter.active)
                .bind(filter.active)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(conn)
                .await
                .context("Failed to list services")?;

            (services, total)
        });

        Ok((services, total))
    }

    async fn list_active(&self) -> Result<Vec<Service>> {
        let sql = format!("{SELECT_SERVICE} WHERE is_active = ? ORDER BY sort_order ASC, id ASC");
        let services = with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Service>(&sql)
                .bind(true)
                .fetch_all(conn)
                .await
                .context("Failed to list active services")?
        });
        Ok(services)
    }

    async fn update(&self, service: &Service) -> Result<Service> {
        let now = Utc::now();
        let features = service.features.to_db();
        with_pool!(self.pool, |conn| {
            sqlx::query(
                r#"
                UPDATE services
                SET title = ?, slug = ?, summary = ?, description = ?, description_html = ?,
                    icon = ?, image_url = ?, features = ?, price_from = ?, sort_order = ?,
                    is_active = ?, seo_title = ?, seo_description = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&service.title)
            .bind(&service.slug)
            .bind(&service.summary)
            .bind(&service.description)
            .bind(&service.description_html)
            .bind(&service.icon)
            .bind(&service.image_url)
            .bind(&features)
            .bind(&service.price_from)
            .bind(service.sort_order)
            .bind(service.is_active)
            .bind(&service.seo_title)
            .bind(&service.seo_description)
            .bind(now)
            .bind(service.id)
            .execute(conn)
            .await
            .context("Failed to update service")?;
        });

        self.get_by_id(service.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Service not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |conn| {
            sqlx::query("DELETE FROM services WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete service")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn reorder(&self, ids: &[i64]) -> Result<()> {
        let now = Utc::now();
        with_pool!(self.pool, |conn| {
            let mut tx = conn.begin().await.context("Failed to begin reorder")?;
            for (position, id) in ids.iter().enumerate() {
                sqlx::query("UPDATE services SET sort_order = ?, updated_at = ? WHERE id = ?")
                    .bind(position as i64)
                    .bind(now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("Failed to move service {}", id))?;
            }
            tx.commit().await.context("Failed to commit reorder")?;
        });
        Ok(())
    }

    async fn next_sort_order(&self) -> Result<i32> {
        let max: Option<i64> = with_pool!(self.pool, |conn| {
            sqlx::query_scalar("SELECT CAST(MAX(sort_order) AS SIGNED) FROM services")
                .fetch_one(conn)
                .await
                .context("Failed to read max service sort order")?
        });
        Ok(max.map_or(0, |m| m as i32 + 1))
    }

    async fn count_active(&self) -> Result<i64> {
        let count: i64 = with_pool!(self.pool, |conn| {
            sqlx::query_scalar("SELECT COUNT(*) FROM services WHERE is_active = ?")
                .bind(true)
                .fetch_one(conn)
                .await
                .context("Failed to count active services")?
        });
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ServiceSort, TextList};

    async fn setup_test_repo() -> SqlxServiceRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxServiceRepository::new(pool)
    }

    fn test_service(slug: &str, sort_order: i32, is_active: bool) -> Service {
        let now = Utc::now();
        Service {
            id: 0,
            title: format!("Service {}", slug),
            slug: slug.to_string(),
            summary: format!("Summary of {}", slug),
            description: String::new(),
            description_html: String::new(),
            icon: None,
            image_url: None,
            features: TextList::new(["Fast", "Reliable"]),
            price_from: Some("from $500".to_string()),
            sort_order,
            is_active,
            seo_title: None,
            seo_description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = setup_test_repo().await;
        let created = repo.create(&test_service("web", 0, true)).await.unwrap();
        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.slug, "web");
        assert_eq!(found.features.as_slice(), &["Fast", "Reliable"]);
        assert_eq!(found.price_from.as_deref(), Some("from $500"));
    }

    #[tokio::test]
    async fn test_list_active_respects_order_and_visibility() {
        let repo = setup_test_repo().await;
        repo.create(&test_service("second", 2, true)).await.unwrap();
        repo.create(&test_service("hidden", 0, false)).await.unwrap();
        repo.create(&test_service("first", 1, true)).await.unwrap();

        let active = repo.list_active().await.unwrap();
        let slugs: Vec<_> = active.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(slugs, vec!["first", "second"]);
        assert_eq!(repo.count_active().await.unwrap(), 2);

        let filter = ServiceFilter {
            active: Some(false),
            ..Default::default()
        };
        let (items, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].slug, "hidden");
    }

    #[tokio::test]
    async fn test_sort_order_helpers() {
        let repo = setup_test_repo().await;
        assert_eq!(repo.next_sort_order().await.unwrap(), 0);

        let a = repo.create(&test_service("a", 0, true)).await.unwrap();
        let b = repo.create(&test_service("b", 4, true)).await.unwrap();
        assert_eq!(repo.next_sort_order().await.unwrap(), 5);

        repo.reorder(&[b.id, a.id]).await.unwrap();
        let active = repo.list_active().await.unwrap();
        assert_eq!(active[0].id, b.id);
        assert_eq!(active[0].sort_order, 0);
        assert_eq!(active[1].sort_order, 1);
        assert_eq!(repo.next_sort_order().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reorder_rolls_back_on_failure() {
        let repo = setup_test_repo().await;
        let a = repo.create(&test_service("a", 0, true)).await.unwrap();
        let b = repo.create(&test_service("b", 1, true)).await.unwrap();

        // A trigger makes the second update fail after the first has run
        let pool = repo.pool.as_sqlite().unwrap();
        sqlx::query(&format!(
            "CREATE TRIGGER refuse_move BEFORE UPDATE ON services WHEN NEW.id = {} \
             BEGIN SELECT RAISE(ABORT, 'refused'); END",
            a.id
        ))
        .execute(pool)
        .await
        .unwrap();

        assert!(repo.reorder(&[b.id, a.id]).await.is_err());
        let active = repo.list_active().await.unwrap();
        assert_eq!(active[0].id, a.id);
        assert_eq!(active[0].sort_order, 0);
        assert_eq!(active[1].sort_order, 1);
    }

    #[tokio::test]
    async fn test_list_sorts_by_title() {
        let repo = setup_test_repo().await;
        repo.create(&test_service("zebra", 0, true)).await.unwrap();
        repo.create(&test_service("apple", 1, true)).await.unwrap();

        let filter = ServiceFilter {
            sort: ServiceSort::Title,
            ..Default::default()
        };
        let (items, _) = repo.list(&filter, &ListParams::default()).await.unwrap();
        let slugs: Vec<_> = items.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(slugs, vec!["apple", "zebra"]);

        let (items, _) = repo.list(&ServiceFilter::default(), &ListParams::default()).await.unwrap();
        assert_eq!(items[0].slug, "zebra");
    }

    #[tokio::test]
    async fn test_search() {
        let repo = setup_test_repo().await;
        repo.create(&test_service("branding", 0, true)).await.unwrap();
        repo.create(&test_service("hosting", 1, true)).await.unwrap();

        let filter = ServiceFilter {
            search: Some("brand".to_string()),
            ..Default::default()
        };
        let (items, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].slug, "branding");
    }
}
