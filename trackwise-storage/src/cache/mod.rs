//! Distributed cache layer.
//!
//! The cache is an optimisation only: every read it serves can be served by
//! the store, and every failure inside it degrades to a store read. Writes
//! never go through the cache; after a write commits, the
//! [`InvalidationCoordinator`] evicts what the write made stale.

mod fence;
mod glob;
mod invalidation;
mod key;
mod memory;
mod read_through;
mod redis_backend;
mod traits;

pub use glob::{escape as escape_glob, GlobPattern};
pub use invalidation::{InvalidationCoordinator, InvalidationReport, Mutation};
pub use key::{CacheKey, KeyPattern};
pub use memory::InMemoryCacheBackend;
pub use read_through::{CacheConfig, ReadThroughCache};
pub use redis_backend::{RedisCacheBackend, RedisConfig};
pub use traits::{CacheBackend, CacheError, CacheResult, CacheStats};
