//! Service model
//!
//! A service is one of the business's offerings shown on the marketing site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{double_option, TextList};

/// Service offering entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: i64,
    pub title: String,
    pub slug: String,
    /// One-paragraph teaser for cards and listings
    pub summary: String,
    /// Markdown source
    pub description: String,
    pub description_html: String,
    pub icon: Option<String>,
    pub image_url: Option<String>,
    #[sqlx(try_from = "String")]
    pub features: TextList,
    /// Display text such as "from $2,000"
    pub price_from: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a service
#[derive(Debug, Clone, Deserialize)]
pub struct CreateServiceInput {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub price_from: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub seo_title: Option<String>,
    #[serde(default)]
    pub seo_description: Option<String>,
}

fn default_active() -> bool {
    true
}

impl CreateServiceInput {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            slug: None,
            summary: summary.into(),
            description: String::new(),
            icon: None,
            image_url: None,
            features: Vec::new(),
            price_from: None,
            sort_order: None,
            is_active: true,
            seo_title: None,
            seo_description: None,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Input for updating a service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateServiceInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    #[serde(default)]
    pub features: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub price_from: Option<Option<String>>,
    #[serde(default)]
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub seo_title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub seo_description: Option<Option<String>>,
}

/// Sort orders accepted by the admin service listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceSort {
    /// Display order, as shown on the public site
    #[default]
    Position,
    Title,
    Newest,
    RecentlyUpdated,
}

impl ServiceSort {
    pub fn order_by(&self) -> &'static str {
        match self {
            ServiceSort::Position => "sort_order ASC, id ASC",
            ServiceSort::Title => "title ASC, id ASC",
            ServiceSort::Newest => "created_at DESC, id DESC",
            ServiceSort::RecentlyUpdated => "updated_at DESC, id DESC",
        }
    }
}

/// Filters for service listings
#[derive(Debug, Clone, Default)]
pub struct ServiceFilter {
    pub active: Option<bool>,
    pub search: Option<String>,
    pub sort: ServiceSort,
}
