//! Author service
//!
//! Authors are the bylines attached to posts. They are separate from admin
//! users: a post can be credited to someone who never signs in.

use crate::cache::{CacheLayer, SharedCache};
use crate::db::repositories::{AuthorRepository, PostRepository};
use crate::models::{
    non_blank, Author, AuthorFilter, AuthorWithCount, CreateAuthorInput, ListParams, PagedResult,
    PostStatus, UpdateAuthorInput,
};
use crate::services::slug::slug_or_generate;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const CACHE_KEY_PUBLIC_LIST: &str = "author:list:public";

#[derive(Debug, thiserror::Error)]
pub enum AuthorServiceError {
    #[error("Author slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Author not found: {0}")]
    NotFound(String),

    #[error("Author is credited on {0} post(s)")]
    InUse(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct AuthorService {
    repo: Arc<dyn AuthorRepository>,
    posts: Arc<dyn PostRepository>,
    cache: SharedCache,
}

impl AuthorService {
    pub fn new(
        repo: Arc<dyn AuthorRepository>,
        posts: Arc<dyn PostRepository>,
        cache: SharedCache,
    ) -> Self {
        Self { repo, posts, cache }
    }

    pub async fn create(&self, input: CreateAuthorInput) -> Result<Author, AuthorServiceError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AuthorServiceError::ValidationError(
                "Author name cannot be empty".to_string(),
            ));
        }
        let slug = slug_or_generate(input.slug.as_deref(), &name);
        self.ensure_slug_available(&slug, None).await?;

        let now = Utc::now();
        let author = Author {
            id: 0,
            name,
            slug,
            email: validate_email(input.email)?,
            title: non_blank(input.title),
            bio: non_blank(input.bio),
            avatar_url: non_blank(input.avatar_url),
            twitter: non_blank(input.twitter),
            linkedin: non_blank(input.linkedin),
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&author)
            .await
            .context("Failed to create author")?;
        self.invalidate_cache().await;
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> Result<Author, AuthorServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get author")?
            .ok_or_else(|| AuthorServiceError::NotFound(format!("Author with ID {} not found", id)))
    }

    /// One page of authors with their total post count
    pub async fn list(
        &self,
        filter: &AuthorFilter,
        params: &ListParams,
    ) -> Result<PagedResult<AuthorWithCount>, AuthorServiceError> {
        let (items, total) = self
            .repo
            .list(filter, params)
            .await
            .context("Failed to list authors")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// All authors with their published post count, cached
    pub async fn list_public(&self) -> Result<Vec<AuthorWithCount>, AuthorServiceError> {
        if let Some(list) = self
            .cache
            .get::<Vec<AuthorWithCount>>(CACHE_KEY_PUBLIC_LIST)
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
            .context("Failed to list authors")?;
        let _ = self
            .cache
            .set(CACHE_KEY_PUBLIC_LIST, &list, self.cache.default_ttl())
            .await;
        Ok(list)
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdateAuthorInput,
    ) -> Result<Author, AuthorServiceError> {
        let mut author = self.get(id).await?;

        if let Some(name) = input.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AuthorServiceError::ValidationError(
                    "Author name cannot be empty".to_string(),
                ));
            }
            author.name = name.to_string();
        }
        if let Some(slug) = input.slug {
            let slug = slug_or_generate(Some(&slug), &author.name);
            if slug != author.slug {
                self.ensure_slug_available(&slug, Some(id)).await?;
                author.slug = slug;
            }
        }
        if let Some(email) = input.email {
            author.email = validate_email(email)?;
        }
        if let Some(title) = input.title {
            author.title = non_blank(title);
        }
        if let Some(bio) = input.bio {
            author.bio = non_blank(bio);
        }
        if let Some(avatar_url) = input.avatar_url {
            author.avatar_url = non_blank(avatar_url);
        }
        if let Some(twitter) = input.twitter {
            author.twitter = non_blank(twitter);
        }
        if let Some(linkedin) = input.linkedin {
            author.linkedin = non_blank(linkedin);
        }

        let updated = self
            .repo
            .update(&author)
            .await
            .context("Failed to update author")?;
        self.invalidate_cache().await;
        Ok(updated)
    }

    /// Delete an author no post is credited to
    pub async fn delete(&self, id: i64) -> Result<(), AuthorServiceError> {
        self.get(id).await?;

        let used_by = self
            .posts
            .count_by_author(id)
            .await
            .context("Failed to count author posts")?;
        if used_by > 0 {
            return Err(AuthorServiceError::InUse(used_by));
        }

        self.repo.delete(id).await.context("Failed to delete author")?;
        self.invalidate_cache().await;
        Ok(())
    }

    async fn ensure_slug_available(
        &self,
        slug: &str,
        exclude_id: Option<i64>,
    ) -> Result<(), AuthorServiceError> {
        if slug.is_empty() {
            return Err(AuthorServiceError::ValidationError(
                "Author slug cannot be empty".to_string(),
            ));
        }
        if self
            .repo
            .exists_by_slug(slug, exclude_id)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(AuthorServiceError::DuplicateSlug(slug.to_string()));
        }
        Ok(())
    }

    async fn invalidate_cache(&self) {
        let _ = self.cache.delete_pattern("author:*").await;
    }
}

fn validate_email(email: Option<String>) -> Result<Option<String>, AuthorServiceError> {
    match non_blank(email) {
        Some(email) if !crate::services::email::is_valid_email(&email) => Err(
            AuthorServiceError::ValidationError(format!("Invalid email address: {}", email)),
        ),
        other => Ok(other),
    }
}
