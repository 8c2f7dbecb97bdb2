//! Shared application state handed to every route.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

use trackwise_core::{Project, SystemClock, Task};
use trackwise_storage::{
    ensure_schema, CacheBackend, CacheConfig, DbConfig, EntityStore, InMemoryCacheBackend,
    InMemoryEntityStore, PgEntityStore, ReadThroughCache, RedisCacheBackend, RedisConfig,
};

use crate::config::{AppConfig, CacheKind, StoreKind};
use crate::error::ApiResult;
use crate::handlers::Services;
use crate::pipeline::Mediator;

#[derive(Clone)]
pub struct AppState {
    pub mediator: Arc<Mediator<Services>>,
    pub cache: Arc<ReadThroughCache>,
    pub started_at: Instant,
    /// Cache error count seen by the previous health check.
    pub cache_errors_seen: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self {
            cache: services.cache.clone(),
            mediator: Arc::new(Mediator::new(services)),
            started_at: Instant::now(),
            cache_errors_seen: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create the configured store and cache handles once for the process.
    pub async fn from_config(config: &AppConfig) -> ApiResult<Self> {
        let (projects, tasks): (Arc<dyn EntityStore<Project>>, Arc<dyn EntityStore<Task>>) =
            match config.store {
                StoreKind::Postgres => {
                    let pool = DbConfig::from_env().create_pool()?;
                    ensure_schema(&pool).await?;
                    (
                        Arc::new(PgEntityStore::<Project>::new(pool.clone())),
                        Arc::new(PgEntityStore::<Task>::new(pool)),
                    )
                }
                StoreKind::Memory => (
                    Arc::new(InMemoryEntityStore::<Project>::new()),
                    Arc::new(InMemoryEntityStore::<Task>::new()),
                ),
            };

        let mut cache_config = CacheConfig::from_env();
        let backend: Arc<dyn CacheBackend> = match config.cache {
            CacheKind::Redis => Arc::new(RedisCacheBackend::from_config(&RedisConfig::from_env())?),
            CacheKind::Memory => Arc::new(InMemoryCacheBackend::new()),
            CacheKind::Off => {
                cache_config = cache_config.with_enabled(false);
                Arc::new(InMemoryCacheBackend::new())
            }
        };
        tracing::info!(
            store = ?config.store,
            cache = backend.name(),
            cache_enabled = cache_config.enabled,
            "Backends ready"
        );

        let cache = Arc::new(ReadThroughCache::new(backend, cache_config));
        let services = Services::new(projects, tasks, cache, Arc::new(SystemClock));
        Ok(Self::new(services))
    }
}
