//! AI-assisted content and image generation
//!
//! - `client`: provider HTTP clients and the retry policy
//! - `models`: model table, per-task preferences and fallback
//! - `content`: post / service / SEO / excerpt writing
//! - `image`: XML-briefed image generation

pub mod client;
pub mod content;
pub mod image;
pub mod models;

pub use client::{AiError, Provider, RetryPolicy};
pub use content::ContentGenerator;
pub use image::{ImageBrief, ImageGenerator};
pub use models::{AiTask, ModelManager};
