//! Services layer - Business logic
//!
//! This module contains the business rules of sitecraft. Services are
//! responsible for:
//! - Validating input and enforcing slug / email uniqueness
//! - Referential checks between posts, categories and authors
//! - Coordinating between repositories, cache and email

pub mod analytics;
pub mod author;
pub mod catalog;
pub mod category;
pub mod contact;
pub mod dashboard;
pub mod email;
pub mod markdown;
pub mod password;
pub mod post;
pub mod rate_limiter;
pub mod slug;
pub mod user;

pub use analytics::{AnalyticsService, AnalyticsServiceError, RecordViewInput};
pub use author::{AuthorService, AuthorServiceError};
pub use catalog::{CatalogError, ServiceCatalog};
pub use category::{CategoryService, CategoryServiceError};
pub use contact::{ClientInfo, ContactCounts, ContactService, ContactServiceError};
pub use dashboard::{DashboardService, DashboardStats};
pub use email::{EmailService, LogMailer, Mailer, SmtpMailer};
pub use markdown::{plain_excerpt, reading_time_minutes, render_markdown};
pub use password::{hash_password, verify_password};
pub use post::{PostService, PostServiceError};
pub use rate_limiter::RateLimiter;
pub use slug::generate_slug;
pub use user::{LoginInput, UserService, UserServiceError};
