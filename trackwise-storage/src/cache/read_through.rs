//! Fail-open read-through cache.
//!
//! Every backend call is bounded by a timeout. Reads that fail, time out or
//! find an unreadable payload are treated as misses and logged; population
//! failures are logged and dropped. Callers therefore never see a cache
//! error on the read path, only on explicit removals.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::fence::EpochFence;
use super::key::{CacheKey, KeyPattern};
use super::traits::{CacheBackend, CacheError, CacheResult, CacheStats};

/// Configuration for the read-through cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for single-entity entries.
    pub entity_ttl: Duration,
    /// TTL for list pages and aggregates.
    pub list_ttl: Duration,
    /// Bound on get/set/delete calls.
    pub operation_timeout: Duration,
    /// Bound on pattern deletes, which may scan.
    pub invalidation_timeout: Duration,
    /// When false every read misses and nothing is stored.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entity_ttl: Duration::from_secs(300),
            list_ttl: Duration::from_secs(120),
            operation_timeout: Duration::from_millis(250),
            invalidation_timeout: Duration::from_secs(2),
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |name: &str, fallback: Duration| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };
        let millis = |name: &str, fallback: Duration| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };
        Self {
            entity_ttl: secs("TRACKWISE_CACHE_ENTITY_TTL_SECS", defaults.entity_ttl),
            list_ttl: secs("TRACKWISE_CACHE_LIST_TTL_SECS", defaults.list_ttl),
            operation_timeout: millis("TRACKWISE_CACHE_TIMEOUT_MS", defaults.operation_timeout),
            invalidation_timeout: millis(
                "TRACKWISE_CACHE_INVALIDATION_TIMEOUT_MS",
                defaults.invalidation_timeout,
            ),
            enabled: std::env::var("TRACKWISE_CACHE_ENABLED")
                .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "off"))
                .unwrap_or(defaults.enabled),
        }
    }

    /// Set the entity TTL.
    pub fn with_entity_ttl(mut self, ttl: Duration) -> Self {
        self.entity_ttl = ttl;
        self
    }

    /// Set the list TTL.
    pub fn with_list_ttl(mut self, ttl: Duration) -> Self {
        self.list_ttl = ttl;
        self
    }

    /// Set the per-operation timeout.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Enable or disable caching.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    fenced: AtomicU64,
}

/// Read-through cache in front of the entity stores.
pub struct ReadThroughCache {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
    fence: EpochFence,
    counters: Counters,
}

impl ReadThroughCache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self {
            backend,
            config,
            fence: EpochFence::new(),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            fenced: self.counters.fenced.load(Ordering::Relaxed),
        }
    }

    async fn bounded<T>(
        &self,
        limit: Duration,
        op: impl Future<Output = CacheResult<T>>,
    ) -> CacheResult<T> {
        match tokio::time::timeout(limit, op).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(limit)),
        }
    }

    fn record_error(&self, action: &'static str, key: &str, err: &CacheError) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            backend = self.backend.name(),
            action,
            key,
            error = %err,
            "Cache degraded, continuing without it"
        );
    }

    /// Cached value for `key`. Any failure is a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        if !self.config.enabled {
            return None;
        }

        let raw = match self
            .bounded(self.config.operation_timeout, self.backend.get(key.as_str()))
            .await
        {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(err) => {
                self.record_error("get", key.as_str(), &err);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(err) => {
                self.record_error("decode", key.as_str(), &CacheError::Codec(err.to_string()));
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                let _ = self
                    .bounded(self.config.operation_timeout, self.backend.delete(key.as_str()))
                    .await;
                None
            }
        }
    }

    /// Store `value` under `key`. Returns whether it was stored.
    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) -> bool {
        if !self.config.enabled {
            return false;
        }

        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                self.record_error("encode", key.as_str(), &CacheError::Codec(err.to_string()));
                return false;
            }
        };

        match self
            .bounded(
                self.config.operation_timeout,
                self.backend.set(key.as_str(), payload, ttl),
            )
            .await
        {
            Ok(()) => true,
            Err(err) => {
                self.record_error("set", key.as_str(), &err);
                false
            }
        }
    }

    /// Serve `key` from cache, or run `load` and populate on a hit in the
    /// store. Absent values are not cached.
    ///
    /// Population is discarded if an invalidation of the key's scope ran
    /// while `load` was in flight.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        load: F,
    ) -> Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        if let Some(hit) = self.get(key).await {
            return Ok(Some(hit));
        }

        let epoch = self.fence.current(key.fence_scope());
        let loaded = load().await?;
        if let Some(value) = &loaded {
            self.populate(key, value, ttl, epoch).await;
        }
        Ok(loaded)
    }

    async fn populate<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration, epoch: u64) {
        let scope = key.fence_scope();
        if self.fence.current(scope) != epoch {
            self.counters.fenced.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if !self.set(key, value, ttl).await {
            return;
        }
        if self.fence.current(scope) != epoch {
            self.counters.fenced.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = key.as_str(), "Invalidation raced population, evicting");
            if let Err(err) = self
                .bounded(self.config.operation_timeout, self.backend.delete(key.as_str()))
                .await
            {
                self.record_error("fence-evict", key.as_str(), &err);
            }
        }
    }

    /// Evict one key.
    pub async fn remove(&self, key: &CacheKey) -> CacheResult<bool> {
        self.fence.advance(key.fence_scope());
        if !self.config.enabled {
            return Ok(false);
        }
        self.bounded(self.config.operation_timeout, self.backend.delete(key.as_str()))
            .await
    }

    /// Evict every key matching `pattern`.
    pub async fn remove_by_pattern(&self, pattern: &KeyPattern) -> CacheResult<u64> {
        self.fence.advance(pattern.fence_scope());
        if !self.config.enabled {
            return Ok(0);
        }
        self.bounded(
            self.config.invalidation_timeout,
            self.backend.delete_by_pattern(pattern.as_str()),
        )
        .await
    }
}
