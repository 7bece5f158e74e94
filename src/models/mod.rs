//! Data models
//!
//! This module contains the data structures used throughout sitecraft:
//! - Database entities (Post, Service, Category, Author, User, Session,
//!   ContactSubmission, AnalyticsView)
//! - Create/update inputs accepted by the services
//! - Pagination and list filters

mod analytics;
mod author;
mod category;
mod contact;
mod pagination;
mod post;
mod service;
mod session;
mod text_list;
mod user;

pub use analytics::{AnalyticsSummary, AnalyticsView, DailyViews, NewPageView, PathViews};
pub use author::{
    Author, AuthorFilter, AuthorSort, AuthorWithCount, CreateAuthorInput, UpdateAuthorInput,
};
pub use category::{
    Category, CategoryFilter, CategorySort, CategoryWithCount, CreateCategoryInput,
    UpdateCategoryInput,
};
pub use contact::{ContactFilter, ContactStatus, ContactSubmission, CreateContactInput};
pub use pagination::{ListParams, PagedResult, DEFAULT_LIMIT, MAX_LIMIT};
pub use post::{CreatePostInput, Post, PostFilter, PostSort, PostStatus, UpdatePostInput};
pub use service::{CreateServiceInput, Service, ServiceFilter, ServiceSort, UpdateServiceInput};
pub use session::Session;
pub use text_list::TextList;
pub use user::{CreateUserInput, UpdateUserInput, User, UserFilter, UserRole};

use serde::{Deserialize, Deserializer};

/// A stored enum column held a value no variant matches
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Deserialize a field that distinguishes "absent" from "null".
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`:
/// a missing field stays `None`, an explicit `null` becomes `Some(None)`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trim a string and turn blank values into `None`
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
