//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity and runs
//! the same SQL against SQLite or MySQL through `with_pool!`.

pub mod analytics;
pub mod author;
pub mod category;
pub mod contact;
pub mod post;
pub mod service;
pub mod session;
pub mod user;

pub use analytics::{AnalyticsRepository, SqlxAnalyticsRepository};
pub use author::{AuthorRepository, SqlxAuthorRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use contact::{ContactRepository, SqlxContactRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use service::{ServiceRepository, SqlxServiceRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Case-insensitive `LIKE` pattern for a free-text search term.
///
/// Blank terms yield `None` so the `(? IS NULL OR ...)` guard skips the filter.
pub(crate) fn search_pattern(term: Option<&str>) -> Option<String> {
    let term = term?.trim();
    if term.is_empty() {
        return None;
    }
    Some(format!("%{}%", term.to_lowercase()))
}
