//! Redis cache backend
//!
//! Shared across server instances and survives restarts. The connection is
//! established lazily on first use, so a Redis outage at startup degrades to
//! cache misses instead of preventing the server from starting.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::timeout;

use super::{CacheBackend, CacheError};
use crate::config::RedisConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct RedisCache {
    client: Client,
    connection: std::sync::Arc<OnceCell<ConnectionManager>>,
    op_timeout: Duration,
}

impl RedisCache {
    /// Create a new `RedisCache` from a connection URL
    ///
    /// Only the URL is validated here; no connection is attempted.
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)
            .map_err(|e| CacheError::Backend(format!("Invalid Redis URL: {e}")))?;

        Ok(Self {
            client,
            connection: std::sync::Arc::new(OnceCell::new()),
            op_timeout: CONNECT_TIMEOUT,
        })
    }

    /// Create a `RedisCache` from host/port/password/db settings
    pub fn from_config(config: &RedisConfig) -> Result<Self, CacheError> {
        Self::new(&config.connection_url()?)
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                let manager = timeout(CONNECT_TIMEOUT, ConnectionManager::new(self.client.clone()))
                    .await
                    .map_err(|_| {
                        CacheError::Backend(format!(
                            "Redis connection timed out after {}s",
                            CONNECT_TIMEOUT.as_secs()
                        ))
                    })??;
                tracing::info!("Redis cache connection established");
                Ok::<_, CacheError>(manager)
            })
            .await?;

        Ok(manager.clone())
    }

    async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T, CacheError>
    where
        F: std::future::Future<Output = redis::RedisResult<T>>,
    {
        match timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(|e| {
                tracing::warn!(op = op, error = %e, "Redis command failed");
                CacheError::from(e)
            }),
            Err(_) => Err(CacheError::Backend(format!("Redis {op} timed out"))),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        self.bounded("GET", conn.get(key)).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;

        if ttl.is_zero() {
            self.bounded("SET", conn.set(key, value)).await
        } else {
            // Redis expiry granularity is one second; round up so short TTLs still store
            let seconds = ttl.as_secs().max(1);
            self.bounded("SETEX", conn.set_ex(key, value, seconds))
                .await
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        self.bounded("DEL", conn.del(key)).await
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("connected", &self.connection.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_rejected() {
        assert!(RedisCache::new("not-a-url").is_err());
        assert!(RedisCache::new("redis://127.0.0.1:6379/0").is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_backend_error() {
        // Port 1 is never a Redis server; the connect attempt fails fast
        let cache = RedisCache::new("redis://127.0.0.1:1/").unwrap();
        let err = cache.get("k").await.unwrap_err();
        assert!(matches!(err, CacheError::Backend(_)));
    }
}
