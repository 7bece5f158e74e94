//! Service catalog
//!
//! Manages the business's offerings shown on the marketing site. The public
//! site only ever sees active services, ordered by `sort_order`.

use crate::cache::{CacheLayer, SharedCache};
use crate::db::repositories::ServiceRepository;
use crate::models::{
    non_blank, CreateServiceInput, ListParams, PagedResult, Service, ServiceFilter, TextList,
    UpdateServiceInput,
};
use crate::services::markdown::render_markdown;
use crate::services::slug::slug_or_generate;
use anyhow::Context;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

const CACHE_KEY_ACTIVE_SERVICES: &str = "service:active";
const CACHE_KEY_SERVICE_BY_SLUG: &str = "service:slug:";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Service slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Service not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ServiceCatalog {
    repo: Arc<dyn ServiceRepository>,
    cache: SharedCache,
}

impl ServiceCatalog {
    pub fn new(repo: Arc<dyn ServiceRepository>, cache: SharedCache) -> Self {
        Self { repo, cache }
    }

    /// Create a service. Without an explicit `sort_order` it goes last.
    pub async fn create(&self, input: CreateServiceInput) -> Result<Service, CatalogError> {
        let title = required(&input.title, "Service title")?;
        let slug = slug_or_generate(input.slug.as_deref(), &title);
        if slug.is_empty() {
            return Err(CatalogError::ValidationError(
                "Service slug cannot be empty".to_string(),
            ));
        }
        if self
            .repo
            .exists_by_slug(&slug, None)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(CatalogError::DuplicateSlug(slug));
        }

        let sort_order = match input.sort_order {
            Some(order) => order,
            None => self
                .repo
                .next_sort_order()
                .await
                .context("Failed to compute sort order")?,
        };

        let now = Utc::now();
        let service = Service {
            id: 0,
            title,
            slug,
            summary: input.summary.trim().to_string(),
            description_html: render_markdown(&input.description),
            description: input.description,
            icon: non_blank(input.icon),
            image_url: non_blank(input.image_url),
            features: TextList::new(input.features),
            price_from: non_blank(input.price_from),
            sort_order,
            is_active: input.is_active,
            seo_title: non_blank(input.seo_title),
            seo_description: non_blank(input.seo_description),
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&service)
            .await
            .context("Failed to create service")?;
        tracing::info!("Created service {} ({})", created.id, created.slug);

        self.invalidate_cache().await;
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> Result<Service, CatalogError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get service")?
            .ok_or_else(|| CatalogError::NotFound(format!("Service with ID {} not found", id)))
    }

    /// Public lookup. Inactive services are `NotFound`.
    pub async fn get_active_by_slug(&self, slug: &str) -> Result<Service, CatalogError> {
        let cache_key = format!("{}{}", CACHE_KEY_SERVICE_BY_SLUG, slug);
        if let Some(service) = self.cache.get::<Service>(&cache_key).await.ok().flatten() {
            return Ok(service);
        }

        let service = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get service by slug")?
            .filter(|s| s.is_active)
            .ok_or_else(|| CatalogError::NotFound(format!("Service '{}' not found", slug)))?;

        let _ = self
            .cache
            .set(&cache_key, &service, self.cache.default_ttl())
            .await;
        Ok(service)
    }

    pub async fn list(
        &self,
        filter: &ServiceFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Service>, CatalogError> {
        let (items, total) = self
            .repo
            .list(filter, params)
            .await
            .context("Failed to list services")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// All active services in display order
    pub async fn list_active(&self) -> Result<Vec<Service>, CatalogError> {
        if let Some(services) = self
            .cache
            .get::<Vec<Service>>(CACHE_KEY_ACTIVE_SERVICES)
            .await
            .ok()
            .flatten()
        {
            return Ok(services);
        }

        let services = self
            .repo
            .list_active()
            .await
            .context("Failed to list active services")?;
        let _ = self
            .cache
            .set(CACHE_KEY_ACTIVE_SERVICES, &services, self.cache.default_ttl())
            .await;
        Ok(services)
    }

    pub async fn update(&self, id: i64, input: UpdateServiceInput) -> Result<Service, CatalogError> {
        let mut service = self.get(id).await?;

        if let Some(title) = input.title {
            service.title = required(&title, "Service title")?;
        }
        if let Some(slug) = input.slug {
            let slug = slug_or_generate(Some(&slug), &service.title);
            if slug.is_empty() {
                return Err(CatalogError::ValidationError(
                    "Service slug cannot be empty".to_string(),
                ));
            }
            if slug != service.slug
                && self
                    .repo
                    .exists_by_slug(&slug, Some(id))
                    .await
                    .context("Failed to check slug uniqueness")?
            {
                return Err(CatalogError::DuplicateSlug(slug));
            }
            service.slug = slug;
        }
        if let Some(summary) = input.summary {
            service.summary = summary.trim().to_string();
        }
        if let Some(description) = input.description {
            service.description_html = render_markdown(&description);
            service.description = description;
        }
        if let Some(icon) = input.icon {
            service.icon = non_blank(icon);
        }
        if let Some(image_url) = input.image_url {
            service.image_url = non_blank(image_url);
        }
        if let Some(features) = input.features {
            service.features = TextList::new(features);
        }
        if let Some(price_from) = input.price_from {
            service.price_from = non_blank(price_from);
        }
        if let Some(sort_order) = input.sort_order {
            service.sort_order = sort_order;
        }
        if let Some(is_active) = input.is_active {
            service.is_active = is_active;
        }
        if let Some(seo_title) = input.seo_title {
            service.seo_title = non_blank(seo_title);
        }
        if let Some(seo_description) = input.seo_description {
            service.seo_description = non_blank(seo_description);
        }

        let updated = self
            .repo
            .update(&service)
            .await
            .context("Failed to update service")?;
        self.invalidate_cache().await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), CatalogError> {
        if !self.repo.delete(id).await.context("Failed to delete service")? {
            return Err(CatalogError::NotFound(format!(
                "Service with ID {} not found",
                id
            )));
        }
        tracing::info!("Deleted service {}", id);
        self.invalidate_cache().await;
        Ok(())
    }

    /// Set the display order: the service at `ids[i]` gets `sort_order = i`.
    ///
    /// `ids` must name every service exactly once. The new order is written
    /// in a single transaction.
    pub async fn reorder(&self, ids: &[i64]) -> Result<Vec<Service>, CatalogError> {
        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(CatalogError::ValidationError(format!(
                "Service {} listed more than once",
                dup
            )));
        }
        for id in ids {
            self.get(*id).await?;
        }

        // Ids are distinct and exist, so matching the row count means all are present
        let (_, total) = self
            .repo
            .list(&ServiceFilter::default(), &ListParams::new(1, 1))
            .await
            .context("Failed to count services")?;
        if ids.len() as i64 != total {
            return Err(CatalogError::ValidationError(format!(
                "Reorder must list all {} services, got {}",
                total,
                ids.len()
            )));
        }

        self.repo
            .reorder(ids)
            .await
            .context("Failed to update sort order")?;

        self.invalidate_cache().await;
        let (services, _) = self
            .repo
            .list(&ServiceFilter::default(), &ListParams::new(1, crate::models::MAX_LIMIT))
            .await
            .context("Failed to list services")?;
        Ok(services)
    }

    async fn invalidate_cache(&self) {
        let _ = self.cache.delete_pattern("service:*").await;
    }
}

fn required(value: &str, field: &str) -> Result<String, CatalogError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CatalogError::ValidationError(format!(
            "{} cannot be empty",
            field
        )));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::SqlxServiceRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_catalog() -> ServiceCatalog {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        ServiceCatalog::new(
            SqlxServiceRepository::boxed(pool),
            create_cache(&CacheConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_create_appends_and_renders() {
        let catalog = setup_test_catalog().await;
        let first = catalog
            .create(
                CreateServiceInput::new("Web Design", "Sites that convert")
                    .with_description("We build **fast** sites.")
                    .with_features(["Responsive", "SEO ready", "Responsive"]),
            )
            .await
            .unwrap();
        let second = catalog
            .create(CreateServiceInput::new("SEO Audits", "Rank higher"))
            .await
            .unwrap();

        assert_eq!(first.slug, "web-design");
        assert_eq!(first.sort_order, 0);
        assert_eq!(second.sort_order, 1);
        assert!(first.description_html.contains("<strong>fast</strong>"));
        assert_eq!(first.features.as_slice(), ["Responsive", "SEO ready"]);
    }

    #[tokio::test]
    async fn test_duplicate_slug_and_validation() {
        let catalog = setup_test_catalog().await;
        catalog
            .create(CreateServiceInput::new("Branding", "Logos"))
            .await
            .unwrap();

        let result = catalog
            .create(CreateServiceInput::new("Other", "x").with_slug("branding"))
            .await;
        assert!(matches!(result, Err(CatalogError::DuplicateSlug(_))));

        let result = catalog.create(CreateServiceInput::new(" ", "x")).await;
        assert!(matches!(result, Err(CatalogError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_inactive_hidden_from_public() {
        let catalog = setup_test_catalog().await;
        catalog
            .create(CreateServiceInput::new("Visible", "x"))
            .await
            .unwrap();
        let hidden = catalog
            .create(CreateServiceInput::new("Hidden", "x").inactive())
            .await
            .unwrap();

        let active = catalog.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(matches!(
            catalog.get_active_by_slug("hidden").await,
            Err(CatalogError::NotFound(_))
        ));

        // activation shows up despite the cached list
        catalog
            .update(
                hidden.id,
                UpdateServiceInput {
                    is_active: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(catalog.list_active().await.unwrap().len(), 2);
        assert_eq!(catalog.get_active_by_slug("hidden").await.unwrap().id, hidden.id);
    }

    #[tokio::test]
    async fn test_reorder() {
        let catalog = setup_test_catalog().await;
        let a = catalog.create(CreateServiceInput::new("A", "x")).await.unwrap();
        let b = catalog.create(CreateServiceInput::new("B", "x")).await.unwrap();
        let c = catalog.create(CreateServiceInput::new("C", "x")).await.unwrap();

        let ordered = catalog.reorder(&[c.id, a.id, b.id]).await.unwrap();
        let titles: Vec<_> = ordered.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["C", "A", "B"]);

        let active: Vec<_> = catalog
            .list_active()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(active, [c.id, a.id, b.id]);

        assert!(matches!(
            catalog.reorder(&[a.id, a.id]).await,
            Err(CatalogError::ValidationError(_))
        ));
        assert!(matches!(
            catalog.reorder(&[a.id, 999]).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reorder_requires_every_service() {
        let catalog = setup_test_catalog().await;
        let a = catalog.create(CreateServiceInput::new("A", "x")).await.unwrap();
        let b = catalog.create(CreateServiceInput::new("B", "x")).await.unwrap();
        let c = catalog.create(CreateServiceInput::new("C", "x")).await.unwrap();

        assert!(matches!(
            catalog.reorder(&[c.id, a.id]).await,
            Err(CatalogError::ValidationError(_))
        ));

        // Nothing moved
        let active: Vec<_> = catalog
            .list_active()
            .await
            .unwrap()
            .into_iter()
            .map(|s| (s.id, s.sort_order))
            .collect();
        assert_eq!(active, [(a.id, a.sort_order), (b.id, b.sort_order), (c.id, c.sort_order)]);
    }

    #[tokio::test]
    async fn test_delete() {
        let catalog = setup_test_catalog().await;
        let service = catalog.create(CreateServiceInput::new("Temp", "x")).await.unwrap();
        catalog.delete(service.id).await.unwrap();
        assert!(matches!(
            catalog.delete(service.id).await,
            Err(CatalogError::NotFound(_))
        ));
        assert!(catalog.list_active().await.unwrap().is_empty());
    }
}
