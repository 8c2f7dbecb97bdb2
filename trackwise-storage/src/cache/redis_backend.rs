//! Redis cache backend over a `deadpool-redis` pool.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Pool, PoolConfig, Runtime};
use redis::AsyncCommands;

use super::traits::{CacheBackend, CacheError, CacheResult};

/// Redis connection settings.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/0`
    pub url: String,
    /// Maximum pool size
    pub pool_size: usize,
    /// `COUNT` hint for each `SCAN` step during pattern deletes
    pub scan_batch: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: 16,
            scan_batch: 500,
        }
    }
}

impl RedisConfig {
    /// Create a Redis configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("TRACKWISE_REDIS_URL").unwrap_or(defaults.url),
            pool_size: std::env::var("TRACKWISE_REDIS_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pool_size),
            scan_batch: std::env::var("TRACKWISE_REDIS_SCAN_BATCH")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|batch: &usize| *batch > 0)
                .unwrap_or(defaults.scan_batch),
        }
    }

    pub fn create_pool(&self) -> CacheResult<Pool> {
        let mut cfg = deadpool_redis::Config::from_url(self.url.clone());
        cfg.pool = Some(PoolConfig::new(self.pool_size));
        cfg.create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Backend(format!("Failed to create redis pool: {}", e)))
    }
}

fn backend_error(err: impl std::fmt::Display) -> CacheError {
    CacheError::Backend(err.to_string())
}

/// [`CacheBackend`] storing payloads as plain Redis strings.
#[derive(Clone)]
pub struct RedisCacheBackend {
    pool: Pool,
    scan_batch: usize,
}

impl RedisCacheBackend {
    pub fn new(pool: Pool, scan_batch: usize) -> Self {
        Self {
            pool,
            scan_batch: scan_batch.max(1),
        }
    }

    pub fn from_config(config: &RedisConfig) -> CacheResult<Self> {
        Ok(Self::new(config.create_pool()?, config.scan_batch))
    }

    async fn connection(&self) -> CacheResult<deadpool_redis::Connection> {
        self.pool.get().await.map_err(backend_error)
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection().await?;
        conn.get(key).await.map_err(backend_error)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis)
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.connection().await?;
        let removed: u64 = conn.del(key).await.map_err(backend_error)?;
        Ok(removed > 0)
    }

    async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut conn = self.connection().await?;
        let mut cursor: u64 = 0;
        let mut removed = 0u64;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(self.scan_batch)
                .query_async(&mut conn)
                .await
                .map_err(backend_error)?;

            if !keys.is_empty() {
                let unlinked: u64 = redis::cmd("UNLINK")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(backend_error)?;
                removed += unlinked;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(removed)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
