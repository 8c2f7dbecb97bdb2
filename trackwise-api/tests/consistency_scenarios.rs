//! End-to-end scenarios through the command/query pipeline.
//!
//! Each test runs the real handlers over in-memory stores and an in-memory
//! cache, so cache population and invalidation are exercised exactly as in
//! production.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use trackwise_core::{
    ErrorCode, ExpectedVersion, PageRequest, Priority, TaskStatus, TrackError, Versioned,
};
use trackwise_api::{Mediator, Services};
use trackwise_storage::{
    CacheBackend, CacheConfig, CacheResult, InMemoryCacheBackend, InMemoryEntityStore,
    ReadThroughCache,
};
use trackwise_api::handlers::{
    CreateProject, CreateTask, DeleteProject, DeleteTask, GetProjectById, GetTaskById,
    GetTaskStatistics, ListProjects, ListTasks, UpdateProject, UpdateTask, UpdateTaskStatus,
};
use trackwise_test_utils::{fixtures, ManualClock, Project, Task};

#[path = "support/harness.rs"]
mod harness;
use harness::Harness;

// ============================================================================
// HELPERS
// ============================================================================

fn create_project(owner: &str, name: &str) -> CreateProject {
    CreateProject {
        owner_id: owner.to_string(),
        name: name.to_string(),
        description: None,
    }
}

fn update_project(
    current: &Versioned<Project>,
    actor: &str,
    name: &str,
    expected: Option<ExpectedVersion>,
) -> UpdateProject {
    UpdateProject {
        id: current.value.id,
        actor: actor.to_string(),
        name: name.to_string(),
        description: current.value.description.clone(),
        expected,
    }
}

fn create_task(project: &Versioned<Project>, title: &str) -> CreateTask {
    CreateTask {
        project_id: project.value.id,
        actor: project.value.owner_id.clone(),
        title: title.to_string(),
        description: None,
        priority: None,
        assignee_user_id: None,
        due_date: None,
        tags: Vec::new(),
    }
}

fn exactly(v: &Versioned<impl Clone>) -> Option<ExpectedVersion> {
    Some(ExpectedVersion::exactly(v.version.clone()))
}

fn code<T: std::fmt::Debug>(result: Result<T, TrackError>) -> ErrorCode {
    result.unwrap_err().code()
}

// ============================================================================
// VERSIONING
// ============================================================================

#[tokio::test]
async fn test_alpha_lifecycle_with_stale_tag() {
    let h = Harness::new();

    let created = h.mediator.send(create_project("o1", "Alpha")).await.unwrap();
    let t1 = h
        .mediator
        .send(GetProjectById {
            id: created.value.id,
            requester: "o1".into(),
        })
        .await
        .unwrap();
    assert_eq!(t1.version, created.version);

    let t2 = h
        .mediator
        .send(update_project(&t1, "o1", "Alpha Prime", exactly(&t1)))
        .await
        .unwrap();
    assert_ne!(t2.version, t1.version);
    assert_eq!(t2.value.name, "Alpha Prime");

    let stale = h
        .mediator
        .send(update_project(&t1, "o1", "Alpha Again", exactly(&t1)))
        .await;
    assert_eq!(code(stale), ErrorCode::PreconditionFailed);

    let unchanged = h
        .mediator
        .send(GetProjectById {
            id: created.value.id,
            requester: "o1".into(),
        })
        .await
        .unwrap();
    assert_eq!(unchanged.version, t2.version);
    assert_eq!(unchanged.value.name, "Alpha Prime");

    h.mediator
        .send(DeleteProject {
            id: created.value.id,
            actor: "o1".into(),
            expected: exactly(&t2),
        })
        .await
        .unwrap();

    let gone = h
        .mediator
        .send(GetProjectById {
            id: created.value.id,
            requester: "o1".into(),
        })
        .await;
    assert_eq!(code(gone), ErrorCode::NotFound);

    let again = h
        .mediator
        .send(DeleteProject {
            id: created.value.id,
            actor: "o1".into(),
            expected: None,
        })
        .await;
    assert_eq!(code(again), ErrorCode::NotFound);
}

#[tokio::test]
async fn test_reads_without_writes_keep_the_same_tag() {
    let h = Harness::new();
    let created = h.mediator.send(create_project("o1", "Stable")).await.unwrap();

    let mut tags = Vec::new();
    for _ in 0..3 {
        h.tick();
        let read = h
            .mediator
            .send(GetProjectById {
                id: created.value.id,
                requester: "o1".into(),
            })
            .await
            .unwrap();
        tags.push(read.version);
    }
    assert!(tags.iter().all(|t| *t == created.version));
}

#[tokio::test]
async fn test_update_without_clock_movement_still_changes_tag() {
    let h = Harness::new();
    let created = h.mediator.send(create_project("o1", "Frozen")).await.unwrap();

    let updated = h
        .mediator
        .send(update_project(&created, "o1", "Frozen Too", None))
        .await
        .unwrap();
    assert!(updated.value.updated_at > created.value.updated_at);
    assert_ne!(updated.version, created.version);
}

#[tokio::test]
async fn test_wildcard_precondition_admits_current_version() {
    let h = Harness::new();
    let created = h.mediator.send(create_project("o1", "Wild")).await.unwrap();
    let updated = h
        .mediator
        .send(update_project(&created, "o1", "Wilder", Some(ExpectedVersion::Any)))
        .await
        .unwrap();
    assert_eq!(updated.value.name, "Wilder");
}

#[tokio::test]
async fn test_concurrent_updates_with_same_tag_admit_one() {
    let h = Harness::new();
    let created = h.mediator.send(create_project("o1", "Contended")).await.unwrap();

    let (a, b) = tokio::join!(
        h.mediator
            .send(update_project(&created, "o1", "Winner A", exactly(&created))),
        h.mediator
            .send(update_project(&created, "o1", "Winner B", exactly(&created))),
    );

    let outcomes = [a.is_ok(), b.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let loser = if a.is_ok() { b } else { a };
    assert_eq!(code(loser), ErrorCode::PreconditionFailed);
}

#[tokio::test]
async fn test_stale_delete_leaves_entity_untouched() {
    let h = Harness::new();
    let t1 = h.mediator.send(create_project("o1", "Keep")).await.unwrap();
    let t2 = h
        .mediator
        .send(update_project(&t1, "o1", "Keep Going", exactly(&t1)))
        .await
        .unwrap();

    let stale = h
        .mediator
        .send(DeleteProject {
            id: t1.value.id,
            actor: "o1".into(),
            expected: exactly(&t1),
        })
        .await;
    assert_eq!(code(stale), ErrorCode::PreconditionFailed);

    let still_there = h
        .mediator
        .send(GetProjectById {
            id: t1.value.id,
            requester: "o1".into(),
        })
        .await
        .unwrap();
    assert_eq!(still_there.version, t2.version);
    assert_eq!(still_there.value.name, "Keep Going");

    let task = h.mediator.send(create_task(&t2, "Survivor")).await.unwrap();
    let moved = h
        .mediator
        .send(UpdateTaskStatus {
            id: task.value.id,
            actor: "o1".into(),
            status: TaskStatus::InProgress,
            expected: exactly(&task),
        })
        .await
        .unwrap();
    let stale_task = h
        .mediator
        .send(DeleteTask {
            id: task.value.id,
            actor: "o1".into(),
            expected: exactly(&task),
        })
        .await;
    assert_eq!(code(stale_task), ErrorCode::PreconditionFailed);

    let task_now = h
        .mediator
        .send(GetTaskById {
            id: task.value.id,
            requester: "o1".into(),
        })
        .await
        .unwrap();
    assert_eq!(task_now.version, moved.version);
}

#[tokio::test]
async fn test_unconditional_update_without_contention_succeeds() {
    let h = Harness::new();
    let created = h.mediator.send(create_project("o1", "Open")).await.unwrap();
    for name in ["Open One", "Open Two", "Open Three"] {
        h.mediator
            .send(update_project(&created, "o1", name, None))
            .await
            .unwrap();
    }
    let read = h
        .mediator
        .send(GetProjectById {
            id: created.value.id,
            requester: "o1".into(),
        })
        .await
        .unwrap();
    assert_eq!(read.value.name, "Open Three");
}

// ============================================================================
// UNIQUENESS AND SOFT DELETE
// ============================================================================

#[tokio::test]
async fn test_duplicate_name_is_scoped_to_owner() {
    let h = Harness::new();
    h.mediator.send(create_project("o1", "Alpha")).await.unwrap();

    let duplicate = h.mediator.send(create_project("o1", "Alpha")).await;
    assert_eq!(code(duplicate), ErrorCode::Duplicate);

    h.mediator.send(create_project("o2", "Alpha")).await.unwrap();
}

#[tokio::test]
async fn test_rename_onto_sibling_name_is_duplicate() {
    let h = Harness::new();
    h.mediator.send(create_project("o1", "Alpha")).await.unwrap();
    let beta = h.mediator.send(create_project("o1", "Beta")).await.unwrap();

    let clash = h
        .mediator
        .send(update_project(&beta, "o1", "Alpha", None))
        .await;
    assert_eq!(code(clash), ErrorCode::Duplicate);
}

#[tokio::test]
async fn test_deleted_name_can_be_reused() {
    let h = Harness::new();
    let first = h.mediator.send(create_project("o1", "Phoenix")).await.unwrap();
    h.mediator
        .send(DeleteProject {
            id: first.value.id,
            actor: "o1".into(),
            expected: None,
        })
        .await
        .unwrap();

    let second = h.mediator.send(create_project("o1", "Phoenix")).await.unwrap();
    assert_ne!(second.value.id, first.value.id);
}

// ============================================================================
// CACHE COHERENCE
// ============================================================================

#[tokio::test]
async fn test_paged_listing_reflects_new_sibling() {
    let h = Harness::new();
    for name in ["First", "Second", "Third"] {
        h.tick();
        h.mediator.send(create_project("o2", name)).await.unwrap();
    }

    let list = |n| ListProjects {
        owner_id: "o2".into(),
        page: PageRequest::new(n, 2),
    };

    let page1 = h.mediator.send(list(1)).await.unwrap();
    assert_eq!(page1.items.len(), 2);
    assert_eq!(page1.total_count, 3);
    assert_eq!(page1.total_pages, 2);
    assert_eq!(page1.items[0].value.name, "Third");
    assert!(h.backends.cache_backend.contains("projects:list:o2:1:2"));

    let page2 = h.mediator.send(list(2)).await.unwrap();
    assert_eq!(page2.items.len(), 1);
    assert_eq!(page2.items[0].value.name, "First");

    h.tick();
    h.mediator.send(create_project("o2", "Fourth")).await.unwrap();
    assert!(!h.backends.cache_backend.contains("projects:list:o2:1:2"));

    let fresh = h.mediator.send(list(1)).await.unwrap();
    assert_eq!(fresh.total_count, 4);
    assert_eq!(fresh.items[0].value.name, "Fourth");
}

#[tokio::test]
async fn test_update_evicts_cached_entity() {
    let h = Harness::new();
    let created = h.mediator.send(create_project("o1", "Cached")).await.unwrap();
    let get = GetProjectById {
        id: created.value.id,
        requester: "o1".into(),
    };

    h.mediator.send(get.clone()).await.unwrap();
    let key = format!("projects:{}", created.value.id);
    assert!(h.backends.cache_backend.contains(&key));

    let updated = h
        .mediator
        .send(update_project(&created, "o1", "Cached Again", None))
        .await
        .unwrap();
    assert!(!h.backends.cache_backend.contains(&key));

    let read = h.mediator.send(get).await.unwrap();
    assert_eq!(read.version, updated.version);
}

#[tokio::test]
async fn test_cache_outage_degrades_to_store() {
    let h = Harness::new();
    h.backends.cache_backend.set_online(false);

    let created = h.mediator.send(create_project("o1", "Offline")).await.unwrap();
    let read = h
        .mediator
        .send(GetProjectById {
            id: created.value.id,
            requester: "o1".into(),
        })
        .await
        .unwrap();
    assert_eq!(read.version, created.version);

    let updated = h
        .mediator
        .send(update_project(&read, "o1", "Still Offline", exactly(&read)))
        .await
        .unwrap();
    let page = h
        .mediator
        .send(ListProjects {
            owner_id: "o1".into(),
            page: PageRequest::default(),
        })
        .await
        .unwrap();
    assert_eq!(page.items[0].version, updated.version);
    assert!(h.backends.cache.stats().errors > 0);
}

/// Cache backend whose evictions lag, widening the window between the
/// store commit and the end of invalidation.
struct LaggingEviction {
    inner: Arc<InMemoryCacheBackend>,
    lag: Duration,
}

#[async_trait]
impl CacheBackend for LaggingEviction {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        tokio::time::sleep(self.lag).await;
        self.inner.delete(key).await
    }

    async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64> {
        tokio::time::sleep(self.lag).await;
        self.inner.delete_by_pattern(pattern).await
    }

    fn name(&self) -> &'static str {
        "lagging"
    }
}

#[tokio::test]
async fn test_abandoned_write_still_invalidates() {
    let backend = Arc::new(InMemoryCacheBackend::new());
    let cache = Arc::new(ReadThroughCache::new(
        Arc::new(LaggingEviction {
            inner: backend.clone(),
            lag: Duration::from_millis(100),
        }),
        CacheConfig::default(),
    ));
    let services = Services::new(
        Arc::new(InMemoryEntityStore::<Project>::new()),
        Arc::new(InMemoryEntityStore::<Task>::new()),
        cache,
        Arc::new(ManualClock::at_epoch()),
    );
    let mediator = Mediator::new(services);

    let created = mediator.send(create_project("o1", "Alpha")).await.unwrap();
    let get = GetProjectById {
        id: created.value.id,
        requester: "o1".into(),
    };
    mediator.send(get.clone()).await.unwrap();
    assert!(backend.contains(&format!("projects:{}", created.value.id)));

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        mediator.send(update_project(&created, "o1", "Beta", None)),
    )
    .await;
    assert!(abandoned.is_err());

    let mut name = String::new();
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        name = mediator.send(get.clone()).await.unwrap().value.name;
        if name == "Beta" {
            break;
        }
    }
    assert_eq!(name, "Beta");
}

#[tokio::test]
async fn test_store_outage_is_unavailable() {
    let h = Harness::new();
    h.backends.projects.set_available(false);
    let result = h.mediator.send(create_project("o1", "Doomed")).await;
    assert_eq!(code(result), ErrorCode::Unavailable);
}

// ============================================================================
// VALIDATION AND OWNERSHIP
// ============================================================================

#[tokio::test]
async fn test_validation_failure_touches_nothing() {
    let h = Harness::new();
    let result = h
        .mediator
        .send(CreateProject {
            owner_id: " ".into(),
            name: "ab".into(),
            description: Some("x".repeat(2001)),
        })
        .await;

    match result {
        Err(TrackError::ValidationFailed { failures }) => {
            let fields: Vec<&str> = failures.iter().map(|f| f.field.as_str()).collect();
            assert_eq!(fields, vec!["owner_id", "name", "description"]);
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(h.backends.projects.raw_len().await, 0);
    assert!(h.backends.cache_backend.keys().is_empty());
}

#[tokio::test]
async fn test_paging_bounds_are_validated() {
    let h = Harness::new();
    let result = h
        .mediator
        .send(ListProjects {
            owner_id: "o1".into(),
            page: PageRequest::new(0, 101),
        })
        .await;
    match result {
        Err(TrackError::ValidationFailed { failures }) => assert_eq!(failures.len(), 2),
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_owner_is_forbidden() {
    let h = Harness::new();
    let project = h.mediator.send(create_project("o1", "Private")).await.unwrap();

    let read = h
        .mediator
        .send(GetProjectById {
            id: project.value.id,
            requester: "o2".into(),
        })
        .await;
    assert_eq!(code(read), ErrorCode::Forbidden);

    let mut foreign_task = create_task(&project, "Sneaky task");
    foreign_task.actor = "o2".into();
    assert_eq!(code(h.mediator.send(foreign_task).await), ErrorCode::Forbidden);

    let rename = h
        .mediator
        .send(update_project(&project, "o2", "Stolen", None))
        .await;
    assert_eq!(code(rename), ErrorCode::Forbidden);
}

// ============================================================================
// TASKS
// ============================================================================

#[tokio::test]
async fn test_task_lifecycle_keeps_listings_and_statistics_fresh() {
    let h = Harness::new();
    let project = h.mediator.send(create_project("o1", "Roadmap")).await.unwrap();

    let mut request = create_task(&project, "Write docs");
    request.priority = Some(Priority::High);
    request.tags = vec![" docs ".into()];
    request.due_date = Some(fixtures::future_due_date());
    let task = h.mediator.send(request).await.unwrap();
    assert_eq!(task.value.status, TaskStatus::New);
    assert_eq!(task.value.tags, vec!["docs".to_string()]);

    let list_all = ListTasks {
        project_id: project.value.id,
        requester: "o1".into(),
        status: None,
        page: PageRequest::default(),
    };
    let stats = GetTaskStatistics {
        project_id: project.value.id,
        requester: "o1".into(),
    };

    assert_eq!(h.mediator.send(list_all.clone()).await.unwrap().total_count, 1);
    let before = h.mediator.send(stats.clone()).await.unwrap();
    assert_eq!(before.total, 1);
    assert_eq!(before.completion_percentage, 0.0);
    assert!(h
        .backends
        .cache_backend
        .contains(&format!("tasks:list:{}:stats", project.value.id)));

    let done = h
        .mediator
        .send(UpdateTaskStatus {
            id: task.value.id,
            actor: "o1".into(),
            status: TaskStatus::Done,
            expected: exactly(&task),
        })
        .await
        .unwrap();
    assert_ne!(done.version, task.version);

    let after = h.mediator.send(stats).await.unwrap();
    assert_eq!(after.completion_percentage, 100.0);

    let done_only = h
        .mediator
        .send(ListTasks {
            status: Some(TaskStatus::Done),
            ..list_all.clone()
        })
        .await
        .unwrap();
    assert_eq!(done_only.items.len(), 1);
    assert_eq!(done_only.items[0].version, done.version);

    let stale = h
        .mediator
        .send(UpdateTaskStatus {
            id: task.value.id,
            actor: "o1".into(),
            status: TaskStatus::Blocked,
            expected: exactly(&task),
        })
        .await;
    assert_eq!(code(stale), ErrorCode::PreconditionFailed);

    h.mediator
        .send(DeleteTask {
            id: task.value.id,
            actor: "o1".into(),
            expected: exactly(&done),
        })
        .await
        .unwrap();
    assert_eq!(h.mediator.send(list_all).await.unwrap().total_count, 0);
}

#[tokio::test]
async fn test_full_task_update_replaces_editable_fields() {
    let h = Harness::new();
    let project = h.mediator.send(create_project("o1", "Replace")).await.unwrap();
    let mut request = create_task(&project, "Draft");
    request.description = Some("old".into());
    request.tags = vec!["old".into()];
    let task = h.mediator.send(request).await.unwrap();

    let updated = h
        .mediator
        .send(UpdateTask {
            id: task.value.id,
            actor: "o1".into(),
            title: "Final".into(),
            description: None,
            status: TaskStatus::InProgress,
            priority: Priority::Urgent,
            assignee_user_id: Some("u7".into()),
            due_date: None,
            tags: Vec::new(),
            expected: exactly(&task),
        })
        .await
        .unwrap();

    let Task {
        title,
        description,
        status,
        priority,
        assignee_user_id,
        tags,
        created_at,
        ..
    } = updated.value;
    assert_eq!(title, "Final");
    assert_eq!(description, None);
    assert_eq!(status, TaskStatus::InProgress);
    assert_eq!(priority, Priority::Urgent);
    assert_eq!(assignee_user_id.as_deref(), Some("u7"));
    assert!(tags.is_empty());
    assert_eq!(created_at, task.value.created_at);
}

#[tokio::test]
async fn test_task_validation_reports_all_failures() {
    let h = Harness::new();
    let project = h.mediator.send(create_project("o1", "Checks")).await.unwrap();
    let mut request = create_task(&project, "no");
    request.tags = (0..11).map(|i| format!("t{}", i)).collect();
    request.due_date = Some(chrono::Utc::now() - chrono::Duration::days(3));

    match h.mediator.send(request).await {
        Err(TrackError::ValidationFailed { failures }) => {
            let fields: Vec<&str> = failures.iter().map(|f| f.field.as_str()).collect();
            assert_eq!(fields, vec!["title", "tags", "due_date"]);
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(h.backends.tasks.raw_len().await, 0);
}

#[tokio::test]
async fn test_deleting_project_hides_its_tasks() {
    let h = Harness::new();
    let project = h.mediator.send(create_project("o1", "Sunset")).await.unwrap();
    let task = h.mediator.send(create_task(&project, "Orphan")).await.unwrap();

    let list = ListTasks {
        project_id: project.value.id,
        requester: "o1".into(),
        status: None,
        page: PageRequest::default(),
    };
    h.mediator.send(list.clone()).await.unwrap();
    let page_key = format!("tasks:list:{}:all:1:20", project.value.id);
    assert!(h.backends.cache_backend.contains(&page_key));

    h.mediator
        .send(DeleteProject {
            id: project.value.id,
            actor: "o1".into(),
            expected: None,
        })
        .await
        .unwrap();
    assert!(!h.backends.cache_backend.contains(&page_key));

    assert_eq!(code(h.mediator.send(list).await), ErrorCode::NotFound);
    let read = h
        .mediator
        .send(GetTaskById {
            id: task.value.id,
            requester: "o1".into(),
        })
        .await;
    assert_eq!(code(read), ErrorCode::NotFound);
}
