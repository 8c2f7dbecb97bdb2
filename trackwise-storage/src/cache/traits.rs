//! Cache backend trait and statistics.
//!
//! Backends store opaque string payloads under string keys with a TTL and
//! support glob-pattern deletion (`*`, `?`, `[...]`, `\` escapes, with the
//! semantics of Redis `SCAN MATCH`). Serialization and failure policy live
//! in [`ReadThroughCache`](super::ReadThroughCache), not in backends.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by cache backends.
///
/// These never reach callers of the consistency layer; the read-through
/// cache logs them and falls back to the store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cached payload is unreadable: {0}")]
    Codec(String),

    #[error("Invalid key pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Pluggable key/value cache.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Payload stored under `key`, if present and not expired.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;

    /// Remove `key`. Returns whether it existed.
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Remove every key matching the glob `pattern`. Returns how many were
    /// removed.
    async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Backend failures, timeouts and unreadable payloads.
    pub errors: u64,
    /// Population attempts discarded because an invalidation raced them.
    pub fenced: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
