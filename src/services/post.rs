//! Post service
//!
//! Business rules for blog posts:
//! - Slugs are generated from the title when omitted and must be unique
//! - `category_id` / `author_id` must reference existing rows
//! - Markdown is rendered and reading time recomputed on every write
//! - `published_at` is stamped the first time a post is published and kept
//!   afterwards, even if the post goes back to draft
//! - Published posts are cached by slug; every write drops the `post:*` keys

use crate::cache::{CacheLayer, SharedCache};
use crate::db::repositories::{AuthorRepository, CategoryRepository, PostRepository};
use crate::models::{
    non_blank, CreatePostInput, ListParams, PagedResult, Post, PostFilter, PostStatus, TextList,
    UpdatePostInput,
};
use crate::services::markdown::{
    plain_excerpt, reading_time_minutes, render_markdown, DEFAULT_EXCERPT_CHARS,
};
use crate::services::slug::slug_or_generate;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const CACHE_KEY_POST_BY_SLUG: &str = "post:slug:";

/// Longest accepted title, in characters
pub const MAX_TITLE_LENGTH: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Post slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Post service for managing blog posts
pub struct PostService {
    repo: Arc<dyn PostRepository>,
    categories: Arc<dyn CategoryRepository>,
    authors: Arc<dyn AuthorRepository>,
    cache: SharedCache,
}

impl PostService {
    pub fn new(
        repo: Arc<dyn PostRepository>,
        categories: Arc<dyn CategoryRepository>,
        authors: Arc<dyn AuthorRepository>,
        cache: SharedCache,
    ) -> Self {
        Self {
            repo,
            categories,
            authors,
            cache,
        }
    }

    /// Create a post
    ///
    /// # Errors
    /// - `ValidationError` for an empty title or slug, or an unknown category / author
    /// - `DuplicateSlug` if the slug is taken
    pub async fn create(&self, input: CreatePostInput) -> Result<Post, PostServiceError> {
        let title = validate_title(&input.title)?;
        let slug = slug_or_generate(input.slug.as_deref(), &title);
        if slug.is_empty() {
            return Err(PostServiceError::ValidationError(
                "Post slug cannot be empty".to_string(),
            ));
        }
        if self
            .repo
            .exists_by_slug(&slug, None)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(PostServiceError::DuplicateSlug(slug));
        }
        self.check_references(input.category_id, input.author_id)
            .await?;

        let status = input.status.unwrap_or_default();
        let now = Utc::now();
        let excerpt = non_blank(input.excerpt)
            .or_else(|| auto_excerpt(&input.content));

        let post = Post {
            id: 0,
            title,
            slug,
            excerpt,
            content_html: render_markdown(&input.content),
            reading_time_minutes: reading_time_minutes(&input.content),
            content: input.content,
            cover_image: non_blank(input.cover_image),
            category_id: input.category_id,
            author_id: input.author_id,
            status,
            featured: input.featured,
            tags: TextList::new(input.tags),
            seo_title: non_blank(input.seo_title),
            seo_description: non_blank(input.seo_description),
            view_count: 0,
            published_at: (status == PostStatus::Published).then_some(now),
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&post).await.context("Failed to create post")?;
        tracing::info!("Created post {} ({})", created.id, created.slug);

        self.invalidate_cache().await;
        Ok(created)
    }

    /// Get a post by ID regardless of status
    pub async fn get(&self, id: i64) -> Result<Post, PostServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or_else(|| PostServiceError::NotFound(format!("Post with ID {} not found", id)))
    }

    /// Get a post by slug regardless of status
    pub async fn get_by_slug(&self, slug: &str) -> Result<Post, PostServiceError> {
        self.repo
            .get_by_slug(slug)
            .await
            .context("Failed to get post by slug")?
            .ok_or_else(|| PostServiceError::NotFound(format!("Post '{}' not found", slug)))
    }

    /// Get a published post by slug. Drafts and archived posts are `NotFound`.
    pub async fn get_published_by_slug(&self, slug: &str) -> Result<Post, PostServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_POST_BY_SLUG, slug);
        if let Some(post) = self.cache.get::<Post>(&cache_key).await.ok().flatten() {
            return Ok(post);
        }

        let post = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get post by slug")?
            .filter(Post::is_published)
            .ok_or_else(|| PostServiceError::NotFound(format!("Post '{}' not found", slug)))?;

        let _ = self
            .cache
            .set(&cache_key, &post, self.cache.default_ttl())
            .await;
        Ok(post)
    }

    /// List posts for the admin panel
    pub async fn list(
        &self,
        filter: &PostFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let (items, total) = self
            .repo
            .list(filter, params)
            .await
            .context("Failed to list posts")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// List published posts. Any status in `filter` is overridden.
    pub async fn list_published(
        &self,
        filter: PostFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let filter = PostFilter {
            status: Some(PostStatus::Published),
            ..filter
        };
        self.list(&filter, params).await
    }

    /// Update a post
    ///
    /// # Errors
    /// - `NotFound` if the post doesn't exist
    /// - `ValidationError` / `DuplicateSlug` as for `create`
    pub async fn update(&self, id: i64, input: UpdatePostInput) -> Result<Post, PostServiceError> {
        let mut post = self.get(id).await?;

        if let Some(title) = input.title {
            post.title = validate_title(&title)?;
        }

        if let Some(slug) = input.slug {
            let slug = slug_or_generate(Some(&slug), &post.title);
            if slug.is_empty() {
                return Err(PostServiceError::ValidationError(
                    "Post slug cannot be empty".to_string(),
                ));
            }
            if slug != post.slug
                && self
                    .repo
                    .exists_by_slug(&slug, Some(id))
                    .await
                    .context("Failed to check slug uniqueness")?
            {
                return Err(PostServiceError::DuplicateSlug(slug));
            }
            post.slug = slug;
        }

        let category_id = input.category_id.unwrap_or(post.category_id);
        let author_id = input.author_id.unwrap_or(post.author_id);
        if category_id != post.category_id || author_id != post.author_id {
            self.check_references(
                category_id.filter(|c| Some(*c) != post.category_id),
                author_id.filter(|a| Some(*a) != post.author_id),
            )
            .await?;
        }
        post.category_id = category_id;
        post.author_id = author_id;

        if let Some(content) = input.content {
            post.content_html = render_markdown(&content);
            post.reading_time_minutes = reading_time_minutes(&content);
            post.content = content;
        }
        if let Some(excerpt) = input.excerpt {
            post.excerpt = non_blank(excerpt);
        }
        if let Some(cover_image) = input.cover_image {
            post.cover_image = non_blank(cover_image);
        }
        if let Some(featured) = input.featured {
            post.featured = featured;
        }
        if let Some(tags) = input.tags {
            post.tags = TextList::new(tags);
        }
        if let Some(seo_title) = input.seo_title {
            post.seo_title = non_blank(seo_title);
        }
        if let Some(seo_description) = input.seo_description {
            post.seo_description = non_blank(seo_description);
        }
        if let Some(status) = input.status {
            post.status = status;
            if status == PostStatus::Published && post.published_at.is_none() {
                post.published_at = Some(Utc::now());
            }
        }

        let updated = self.repo.update(&post).await.context("Failed to update post")?;
        self.invalidate_cache().await;
        Ok(updated)
    }

    /// Delete a post
    pub async fn delete(&self, id: i64) -> Result<(), PostServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete post")?;
        if !deleted {
            return Err(PostServiceError::NotFound(format!(
                "Post with ID {} not found",
                id
            )));
        }
        tracing::info!("Deleted post {}", id);
        self.invalidate_cache().await;
        Ok(())
    }

    /// Bump the view counter. Cached copies keep their old count until the
    /// next write.
    pub async fn record_view(&self, id: i64) -> Result<(), PostServiceError> {
        self.repo
            .increment_view_count(id)
            .await
            .context("Failed to increment view count")?;
        Ok(())
    }

    async fn check_references(
        &self,
        category_id: Option<i64>,
        author_id: Option<i64>,
    ) -> Result<(), PostServiceError> {
        if let Some(category_id) = category_id {
            if self
                .categories
                .get_by_id(category_id)
                .await
                .context("Failed to get category")?
                .is_none()
            {
                return Err(PostServiceError::ValidationError(format!(
                    "Category {} does not exist",
                    category_id
                )));
            }
        }
        if let Some(author_id) = author_id {
            if self
                .authors
                .get_by_id(author_id)
                .await
                .context("Failed to get author")?
                .is_none()
            {
                return Err(PostServiceError::ValidationError(format!(
                    "Author {} does not exist",
                    author_id
                )));
            }
        }
        Ok(())
    }

    /// Post counts appear in the category and author listings
    async fn invalidate_cache(&self) {
        let _ = self.cache.delete_pattern("post:*").await;
        let _ = self.cache.delete_pattern("category:*").await;
        let _ = self.cache.delete_pattern("author:*").await;
    }
}

fn validate_title(title: &str) -> Result<String, PostServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(PostServiceError::ValidationError(
            "Post title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(PostServiceError::ValidationError(format!(
            "Post title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

fn auto_excerpt(content: &str) -> Option<String> {
    let excerpt = plain_excerpt(content, DEFAULT_EXCERPT_CHARS);
    (!excerpt.is_empty()).then_some(excerpt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::{
        SqlxAuthorRepository, SqlxCategoryRepository, SqlxPostRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::Category;

    async fn setup_test_service() -> (PostService, Arc<dyn CategoryRepository>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let categories = SqlxCategoryRepository::boxed(pool.clone());
        let service = PostService::new(
            SqlxPostRepository::boxed(pool.clone()),
            categories.clone(),
            SqlxAuthorRepository::boxed(pool.clone()),
            create_cache(&CacheConfig::default()),
        );
        (service, categories)
    }

    async fn create_category(repo: &Arc<dyn CategoryRepository>, slug: &str) -> Category {
        let now = Utc::now();
        repo.create(&Category {
            id: 0,
            name: slug.to_string(),
            slug: slug.to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("Failed to create category")
    }

    #[tokio::test]
    async fn test_create_renders_and_derives_fields() {
        let (service, _) = setup_test_service().await;
        let post = service
            .create(
                CreatePostInput::new("  Hello World  ", "# Intro\n\nSome **bold** text.")
                    .with_tags(["rust", " web ", "rust"]),
            )
            .await
            .unwrap();

        assert_eq!(post.title, "Hello World");
        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.status, PostStatus::Draft);
        assert!(post.content_html.contains("<strong>bold</strong>"));
        assert_eq!(post.reading_time_minutes, 1);
        assert_eq!(post.excerpt.as_deref(), Some("Intro Some bold text."));
        assert_eq!(post.tags.as_slice(), ["rust", "web"]);
        assert!(post.published_at.is_none());
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (service, _) = setup_test_service().await;

        let result = service.create(CreatePostInput::new("   ", "x")).await;
        assert!(matches!(result, Err(PostServiceError::ValidationError(_))));

        let result = service
            .create(CreatePostInput::new("Title", "x").with_slug("!!!"))
            .await;
        assert!(matches!(result, Err(PostServiceError::ValidationError(_))));

        let result = service
            .create(CreatePostInput::new("Title", "x").with_category(999))
            .await;
        assert!(matches!(result, Err(PostServiceError::ValidationError(_))));

        let result = service
            .create(CreatePostInput::new("Title", "x").with_author(999))
            .await;
        assert!(matches!(result, Err(PostServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let (service, _) = setup_test_service().await;
        service
            .create(CreatePostInput::new("Same Title", "a"))
            .await
            .unwrap();

        let result = service.create(CreatePostInput::new("Same Title", "b")).await;
        assert!(matches!(result, Err(PostServiceError::DuplicateSlug(s)) if s == "same-title"));

        let other = service
            .create(CreatePostInput::new("Other", "c"))
            .await
            .unwrap();
        let result = service
            .update(other.id, UpdatePostInput::default().with_slug("same-title"))
            .await;
        assert!(matches!(result, Err(PostServiceError::DuplicateSlug(_))));

        // keeping its own slug is fine
        service
            .update(other.id, UpdatePostInput::default().with_slug("other"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_published_at_set_once() {
        let (service, _) = setup_test_service().await;
        let post = service.create(CreatePostInput::new("Draft", "x")).await.unwrap();
        assert!(post.published_at.is_none());

        let published = service
            .update(post.id, UpdatePostInput::default().with_status(PostStatus::Published))
            .await
            .unwrap();
        let first = published.published_at.expect("published_at set");

        let drafted = service
            .update(post.id, UpdatePostInput::default().with_status(PostStatus::Draft))
            .await
            .unwrap();
        assert_eq!(drafted.published_at, Some(first));

        let republished = service
            .update(post.id, UpdatePostInput::default().with_status(PostStatus::Published))
            .await
            .unwrap();
        assert_eq!(republished.published_at, Some(first));
    }

    #[tokio::test]
    async fn test_public_reads_hide_drafts() {
        let (service, _) = setup_test_service().await;
        service.create(CreatePostInput::new("Hidden", "x")).await.unwrap();
        service
            .create(CreatePostInput::new("Visible", "x").with_status(PostStatus::Published))
            .await
            .unwrap();

        assert!(matches!(
            service.get_published_by_slug("hidden").await,
            Err(PostServiceError::NotFound(_))
        ));
        assert_eq!(service.get_published_by_slug("visible").await.unwrap().title, "Visible");

        let filter = PostFilter {
            status: Some(PostStatus::Draft),
            ..Default::default()
        };
        let page = service
            .list_published(filter, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].slug, "visible");
    }

    #[tokio::test]
    async fn test_unpublish_invalidates_cached_post() {
        let (service, _) = setup_test_service().await;
        let post = service
            .create(CreatePostInput::new("Cached", "x").with_status(PostStatus::Published))
            .await
            .unwrap();
        service.get_published_by_slug("cached").await.unwrap();

        service
            .update(post.id, UpdatePostInput::default().with_status(PostStatus::Archived))
            .await
            .unwrap();
        assert!(service.get_published_by_slug("cached").await.is_err());
    }

    #[tokio::test]
    async fn test_update_references() {
        let (service, categories) = setup_test_service().await;
        let category = create_category(&categories, "news").await;
        let post = service
            .create(CreatePostInput::new("Ref", "x").with_category(category.id))
            .await
            .unwrap();

        let result = service
            .update(post.id, UpdatePostInput::default().with_category(Some(404)))
            .await;
        assert!(matches!(result, Err(PostServiceError::ValidationError(_))));

        let cleared = service
            .update(post.id, UpdatePostInput::default().with_category(None))
            .await
            .unwrap();
        assert_eq!(cleared.category_id, None);

        let renamed = service
            .update(post.id, UpdatePostInput::default().with_title("Renamed"))
            .await
            .unwrap();
        assert_eq!(renamed.slug, "ref");
    }

    #[tokio::test]
    async fn test_update_content_rerenders() {
        let (service, _) = setup_test_service().await;
        let post = service.create(CreatePostInput::new("Body", "old")).await.unwrap();
        let long = vec!["word"; 450].join(" ");
        let updated = service
            .update(post.id, UpdatePostInput::default().with_content(long))
            .await
            .unwrap();
        assert_eq!(updated.reading_time_minutes, 3);
        assert!(updated.content_html.starts_with("<p>word"));
    }

    #[tokio::test]
    async fn test_delete_and_views() {
        let (service, _) = setup_test_service().await;
        let post = service.create(CreatePostInput::new("Gone", "x")).await.unwrap();

        service.record_view(post.id).await.unwrap();
        service.record_view(post.id).await.unwrap();
        assert_eq!(service.get_by_slug("gone").await.unwrap().view_count, 2);

        service.delete(post.id).await.unwrap();
        assert!(matches!(service.get(post.id).await, Err(PostServiceError::NotFound(_))));
        assert!(matches!(service.delete(post.id).await, Err(PostServiceError::NotFound(_))));
    }
}
