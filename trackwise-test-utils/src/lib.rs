//! Trackwise Test Utilities
//!
//! Shared test infrastructure for the Trackwise workspace:
//! - `ManualClock` for deterministic audit timestamps
//! - In-memory store and cache wiring
//! - Proptest generators for entity types
//! - Fixtures for common scenarios

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

pub use trackwise_core::{
    Clock, EntityId, Priority, Project, Task, TaskStatus, Timestamp, VersionTag,
};
use trackwise_storage::{CacheConfig, InMemoryCacheBackend, InMemoryEntityStore, ReadThroughCache};

// ============================================================================
// CLOCK
// ============================================================================

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(trackwise_core::truncate_to_micros(start)),
        }
    }

    /// 2024-01-01T00:00:00Z.
    pub fn at_epoch() -> Self {
        Self::new(DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_else(Utc::now))
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, at: Timestamp) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = trackwise_core::truncate_to_micros(at);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ============================================================================
// IN-MEMORY WIRING
// ============================================================================

/// In-memory stores and cache, with handles kept for fault injection.
pub struct MemoryBackends {
    pub projects: Arc<InMemoryEntityStore<Project>>,
    pub tasks: Arc<InMemoryEntityStore<Task>>,
    pub cache_backend: Arc<InMemoryCacheBackend>,
    pub cache: Arc<ReadThroughCache>,
}

impl MemoryBackends {
    pub fn new() -> Self {
        Self::with_cache_config(CacheConfig::default())
    }

    pub fn with_cache_config(config: CacheConfig) -> Self {
        let cache_backend = Arc::new(InMemoryCacheBackend::new());
        let cache = Arc::new(ReadThroughCache::new(cache_backend.clone(), config));
        Self {
            projects: Arc::new(InMemoryEntityStore::new()),
            tasks: Arc::new(InMemoryEntityStore::new()),
            cache_backend,
            cache,
        }
    }
}

impl Default for MemoryBackends {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating Trackwise entity types.

    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a microsecond-precision timestamp between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1_577_836_800i64..1_893_456_000i64, 0u32..1_000_000).prop_map(|(secs, micros)| {
            chrono::DateTime::from_timestamp(secs, micros * 1_000).unwrap_or_else(Utc::now)
        })
    }

    pub fn arb_task_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::New),
            Just(TaskStatus::InProgress),
            Just(TaskStatus::Blocked),
            Just(TaskStatus::Done),
        ]
    }

    pub fn arb_priority() -> impl Strategy<Value = Priority> {
        prop_oneof![
            Just(Priority::Low),
            Just(Priority::Medium),
            Just(Priority::High),
            Just(Priority::Urgent),
        ]
    }

    /// A name that passes project validation.
    pub fn arb_project_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 ]{2,40}[A-Za-z0-9]"
    }

    pub fn arb_project() -> impl Strategy<Value = Project> {
        (
            "[a-z0-9]{1,12}",
            arb_project_name(),
            prop::option::of("[a-zA-Z0-9 ]{1,200}"),
            arb_timestamp(),
        )
            .prop_map(|(owner, name, description, at)| Project::new(owner, name, description, at))
    }

    pub fn arb_task(project_id: EntityId) -> impl Strategy<Value = Task> {
        (
            "[A-Za-z][A-Za-z0-9 ]{2,60}",
            arb_task_status(),
            arb_priority(),
            prop::collection::vec("[a-z]{1,12}", 0..5),
            arb_timestamp(),
        )
            .prop_map(move |(title, status, priority, tags, at)| {
                let mut task = Task::new(project_id, title, "o1", at);
                task.status = status;
                task.priority = priority;
                task.tags = tags;
                task
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    pub fn project(owner: &str, name: &str, at: Timestamp) -> Project {
        Project::new(owner, name, None, at)
    }

    pub fn task(project: &Project, title: &str, at: Timestamp) -> Task {
        Task::new(project.id, title, &project.owner_id, at)
    }

    /// A due date a week after the real current time, which always passes
    /// due-date validation.
    pub fn future_due_date() -> Timestamp {
        Utc::now() + Duration::days(7)
    }
}
