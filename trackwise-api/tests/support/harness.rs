//! In-process harness: the full pipeline over in-memory stores and cache,
//! driven by a manual clock.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use chrono::Duration;
use trackwise_api::{create_router, AppState, Mediator, Services};
use trackwise_storage::CacheConfig;
use trackwise_test_utils::{ManualClock, MemoryBackends};

pub struct Harness {
    pub backends: MemoryBackends,
    pub clock: Arc<ManualClock>,
    pub services: Services,
    pub mediator: Mediator<Services>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_cache_config(CacheConfig::default())
    }

    pub fn with_cache_config(config: CacheConfig) -> Self {
        let backends = MemoryBackends::with_cache_config(config);
        let clock = Arc::new(ManualClock::at_epoch());
        let services = Services::new(
            backends.projects.clone(),
            backends.tasks.clone(),
            backends.cache.clone(),
            clock.clone(),
        );
        Self {
            mediator: Mediator::new(services.clone()),
            services,
            backends,
            clock,
        }
    }

    /// Step the clock so successive creations get distinct timestamps.
    pub fn tick(&self) {
        self.clock.advance(Duration::seconds(1));
    }

    pub fn router(&self) -> Router {
        create_router(AppState::new(self.services.clone()))
    }
}
