//! Response cache
//!
//! Two interchangeable backends behind [`CacheBackend`]:
//! - [`MemoryCache`]: in-process Moka cache, lost on restart
//! - [`RedisCache`]: shared across instances, survives restart
//!
//! TTL is advisory: an entry may linger after it expires, but it is never
//! returned by `get` once its TTL has elapsed.

pub mod key_builder;
pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::time::Duration;

pub use key_builder::KeyBuilder;
pub use memory::MemoryCache;
pub use redis::RedisCache;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Backend(String),

    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

impl From<::redis::RedisError> for CacheError {
    fn from(err: ::redis::RedisError) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Key-value store with per-entry TTL
///
/// Values are opaque strings (JSON in practice). Implementations must tolerate
/// concurrent `get`/`set` on the same key; last write wins.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Backend name for logs and diagnostics ("memory", "redis")
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}
