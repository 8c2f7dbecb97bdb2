//! Trackwise Storage
//!
//! Durable entity stores and the read-through cache that fronts them.
//!
//! - [`store`]: the [`EntityStore`] trait with in-memory and PostgreSQL
//!   implementations, including atomic conditional replace.
//! - [`cache`]: pluggable cache backends (in-memory, Redis), the cache key
//!   namespace, the fail-open [`ReadThroughCache`] and the
//!   [`InvalidationCoordinator`] that evicts keys after writes.

pub mod cache;
pub mod store;

pub use cache::{
    CacheBackend, CacheConfig, CacheError, CacheKey, CacheResult, CacheStats,
    InMemoryCacheBackend, InvalidationCoordinator, InvalidationReport, KeyPattern, Mutation,
    ReadThroughCache, RedisCacheBackend, RedisConfig,
};
pub use store::{ensure_schema, DbConfig, EntityStore, InMemoryEntityStore, PgEntityStore, WriteOutcome};
