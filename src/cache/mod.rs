//! Cache layer
//!
//! In-process cache for the public read paths (published posts, active
//! services, category and author listings). Writes invalidate by key prefix
//! with `delete_pattern("post:*")`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sitecraft::cache::{create_cache, CacheLayer};
//! use sitecraft::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("key", &"value", cache.default_ttl()).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache layer trait
///
/// The methods are generic over the cached type, so the trait is not object
/// safe; share the concrete cache through [`SharedCache`].
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values whose key matches a glob pattern (`*`, `?`)
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}

/// Cache handle shared by the services
pub type SharedCache = Arc<MemoryCache>;

/// Create the cache described by `config`
pub fn create_cache(config: &CacheConfig) -> SharedCache {
    let ttl = Duration::from_secs(config.ttl_seconds);
    tracing::debug!(
        "Creating memory cache (capacity {}, ttl {:?})",
        config.max_capacity,
        ttl
    );
    Arc::new(MemoryCache::with_capacity_and_ttl(config.max_capacity, ttl))
}
