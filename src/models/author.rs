//! Author model
//!
//! Authors are the bylines shown on posts. They are independent of admin
//! user accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::double_option;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub email: Option<String>,
    /// Job title shown under the name
    pub title: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Author with the number of posts bylined to them
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuthorWithCount {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub author: Author,
    pub post_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAuthorInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
}

impl CreateAuthorInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: None,
            email: None,
            title: None,
            bio: None,
            avatar_url: None,
            twitter: None,
            linkedin: None,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAuthorInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub twitter: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub linkedin: Option<Option<String>>,
}

/// Sort orders accepted by the admin author listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorSort {
    #[default]
    Name,
    Newest,
    MostPosts,
}

impl AuthorSort {
    pub fn order_by(&self) -> &'static str {
        match self {
            AuthorSort::Name => "a.name ASC, a.id ASC",
            AuthorSort::Newest => "a.created_at DESC, a.id DESC",
            AuthorSort::MostPosts => "post_count DESC, a.name ASC, a.id ASC",
        }
    }
}

/// Filters for the admin author listing
#[derive(Debug, Clone, Default)]
pub struct AuthorFilter {
    /// Case-insensitive substring of the name or email
    pub search: Option<String>,
    pub sort: AuthorSort,
}
