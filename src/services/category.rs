//! Category service
//!
//! Implements business logic for category management:
//! - Create, read, update, delete categories
//! - Slug generation from name and slug uniqueness
//! - Listing with post counts (published-only for the public site)
//! - Refusing to delete a category that posts still reference

use crate::cache::{CacheLayer, SharedCache};
use crate::db::repositories::{CategoryRepository, PostRepository};
use crate::models::{
    non_blank, Category, CategoryFilter, CategoryWithCount, CreateCategoryInput, ListParams,
    PagedResult, PostStatus, UpdateCategoryInput,
};
use crate::services::slug::slug_or_generate;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const CACHE_KEY_PUBLIC_LIST: &str = "category:list:public";

/// Longest accepted category name, in characters
pub const MAX_NAME_LENGTH: usize = 100;

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    /// Category slug already exists
    #[error("Category slug already exists: {0}")]
    DuplicateSlug(String),

    /// Category not found
    #[error("Category not found: {0}")]
    NotFound(String),

    /// Posts still reference the category
    #[error("Category is used by {0} post(s)")]
    InUse(i64),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Category service for managing blog categories
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    posts: Arc<dyn PostRepository>,
    cache: SharedCache,
}

impl CategoryService {
    pub fn new(
        repo: Arc<dyn CategoryRepository>,
        posts: Arc<dyn PostRepository>,
        cache: SharedCache,
    ) -> Self {
        Self { repo, posts, cache }
    }

    /// Create a new category
    ///
    /// # Errors
    /// - `ValidationError` if the name is empty or too long, or the slug normalizes to nothing
    /// - `DuplicateSlug` if a category with the same slug already exists
    pub async fn create(
        &self,
        input: CreateCategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        let name = validate_name(&input.name)?;
        let slug = slug_or_generate(input.slug.as_deref(), &name);
        self.ensure_slug_available(&slug, None).await?;

        let now = Utc::now();
        let category = Category {
            id: 0,
            name,
            slug,
            description: non_blank(input.description),
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&category)
            .await
            .context("Failed to create category")?;

        self.invalidate_cache().await;
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .ok_or_else(|| {
                CategoryServiceError::NotFound(format!("Category with ID {} not found", id))
            })
    }

    /// Get category by slug, `None` if absent
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Category>, CategoryServiceError> {
        Ok(self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get category by slug")?)
    }

    /// One page of categories with their total post count
    pub async fn list(
        &self,
        filter: &CategoryFilter,
        params: &ListParams,
    ) -> Result<PagedResult<CategoryWithCount>, CategoryServiceError> {
        let (items, total) = self
            .repo
            .list(filter, params)
            .await
            .context("Failed to list categories")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// All categories with their published post count, cached
    pub async fn list_public(&self) -> Result<Vec<CategoryWithCount>, CategoryServiceError> {
        if let Some(list) = self
            .cache
            .get::<Vec<CategoryWithCount>>(CACHE_KEY_PUBLIC_LIST)
            .await
            .ok()
            .flatten()
        {
            return Ok(list);
        }

        let list = self
            .repo
            .list_with_counts(Some(PostStatus::Published))
            .await
            .context("Failed to list categories")?;
        let _ = self
            .cache
            .set(CACHE_KEY_PUBLIC_LIST, &list, self.cache.default_ttl())
            .await;
        Ok(list)
    }

    /// Update a category
    ///
    /// # Errors
    /// - `NotFound` if the category doesn't exist
    /// - `DuplicateSlug` if the new slug already exists
    pub async fn update(
        &self,
        id: i64,
        input: UpdateCategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        let mut category = self.get(id).await?;

        if let Some(name) = input.name {
            category.name = validate_name(&name)?;
        }
        if let Some(slug) = input.slug {
            let slug = slug_or_generate(Some(&slug), &category.name);
            if slug != category.slug {
                self.ensure_slug_available(&slug, Some(id)).await?;
                category.slug = slug;
            }
        }
        if let Some(description) = input.description {
            category.description = non_blank(description);
        }

        let updated = self
            .repo
            .update(&category)
            .await
            .context("Failed to update category")?;

        self.invalidate_cache().await;
        Ok(updated)
    }

    /// Delete a category
    ///
    /// # Errors
    /// - `NotFound` if the category doesn't exist
    /// - `InUse` if any post still references it
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        self.get(id).await?;

        let used_by = self
            .posts
            .count_by_category(id)
            .await
            .context("Failed to count category posts")?;
        if used_by > 0 {
            return Err(CategoryServiceError::InUse(used_by));
        }

        self.repo
            .delete(id)
            .await
            .context("Failed to delete category")?;

        self.invalidate_cache().await;
        Ok(())
    }

    async fn ensure_slug_available(
        &self,
        slug: &str,
        exclude_id: Option<i64>,
    ) -> Result<(), CategoryServiceError> {
        if slug.is_empty() {
            return Err(CategoryServiceError::ValidationError(
                "Category slug cannot be empty".to_string(),
            ));
        }
        if self
            .repo
            .exists_by_slug(slug, exclude_id)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(CategoryServiceError::DuplicateSlug(slug.to_string()));
        }
        Ok(())
    }

    async fn invalidate_cache(&self) {
        let _ = self.cache.delete_pattern("category:*").await;
    }
}

fn validate_name(name: &str) -> Result<String, CategoryServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategoryServiceError::ValidationError(
            "Category name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(CategoryServiceError::ValidationError(format!(
            "Category name must be at most {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}
