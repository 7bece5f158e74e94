//! Blog post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{double_option, ParseEnumError, TextList};

/// Blog post entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    pub excerpt: Option<String>,
    /// Markdown source
    pub content: String,
    /// Rendered HTML, regenerated whenever `content` changes
    pub content_html: String,
    pub cover_image: Option<String>,
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    #[sqlx(try_from = "String")]
    pub status: PostStatus,
    pub featured: bool,
    #[sqlx(try_from = "String")]
    pub tags: TextList,
    pub reading_time_minutes: i32,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub view_count: i64,
    /// Set the first time the post is published, never cleared
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Check if the post is visible on the public site
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}

/// Publication state of a post
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(PostStatus::Draft),
            "published" => Ok(PostStatus::Published),
            "archived" => Ok(PostStatus::Archived),
            _ => Err(ParseEnumError::new("post status", s)),
        }
    }
}

impl TryFrom<String> for PostStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Input for creating a post
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub author_id: Option<i64>,
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub seo_title: Option<String>,
    #[serde(default)]
    pub seo_description: Option<String>,
}

impl CreatePostInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_status(mut self, status: PostStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_author(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn featured(mut self) -> Self {
        self.featured = true;
        self
    }
}

/// Input for updating a post. Absent fields are left unchanged; nullable
/// fields accept an explicit `null` to clear them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub excerpt: Option<Option<String>>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub cover_image: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub author_id: Option<Option<i64>>,
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub featured: Option<bool>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub seo_title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub seo_description: Option<Option<String>>,
}

impl UpdatePostInput {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_status(mut self, status: PostStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_category(mut self, category_id: Option<i64>) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

/// Sort orders accepted by post listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostSort {
    #[default]
    Newest,
    Oldest,
    Title,
    MostViewed,
    RecentlyPublished,
}

impl PostSort {
    /// `ORDER BY` clause; `id` breaks ties so pages never overlap
    pub fn order_by(&self) -> &'static str {
        match self {
            PostSort::Newest => "created_at DESC, id DESC",
            PostSort::Oldest => "created_at ASC, id ASC",
            PostSort::Title => "title ASC, id ASC",
            PostSort::MostViewed => "view_count DESC, id DESC",
            PostSort::RecentlyPublished => "published_at DESC, id DESC",
        }
    }
}

/// Filters for post listings
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub featured: Option<bool>,
    /// Case-insensitive substring of the title or excerpt
    pub search: Option<String>,
    /// Exact tag
    pub tag: Option<String>,
    pub sort: PostSort,
}

impl PostFilter {
    /// Filter for what the public site may see
    pub fn published() -> Self {
        Self {
            status: Some(PostStatus::Published),
            sort: PostSort::RecentlyPublished,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [PostStatus::Draft, PostStatus::Published, PostStatus::Archived] {
            assert_eq!(status.to_string().parse::<PostStatus>().unwrap(), status);
        }
        assert!("deleted".parse::<PostStatus>().is_err());
        assert_eq!("PUBLISHED".parse::<PostStatus>().unwrap(), PostStatus::Published);
    }

    #[test]
    fn test_update_input_distinguishes_null_from_absent() {
        let input: UpdatePostInput =
            serde_json::from_str(r#"{"category_id": null, "title": "New"}"#).unwrap();
        assert_eq!(input.category_id, Some(None));
        assert_eq!(input.author_id, None);
        assert_eq!(input.title.as_deref(), Some("New"));

        let input: UpdatePostInput = serde_json::from_str(r#"{"category_id": 4}"#).unwrap();
        assert_eq!(input.category_id, Some(Some(4)));
    }

    #[test]
    fn test_sort_deserializes_snake_case() {
        let sort: PostSort = serde_json::from_str(r#""most_viewed""#).unwrap();
        assert_eq!(sort, PostSort::MostViewed);
        assert!(sort.order_by().starts_with("view_count DESC"));
    }

    #[test]
    fn test_create_input_builder() {
        let input = CreatePostInput::new("Hello", "Body")
            .with_slug("hello")
            .with_status(PostStatus::Published)
            .with_tags(["a", "b"])
            .featured();
        assert_eq!(input.slug.as_deref(), Some("hello"));
        assert_eq!(input.tags, vec!["a".to_string(), "b".to_string()]);
        assert!(input.featured);
    }
}
