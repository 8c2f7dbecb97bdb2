//! Command and query handlers.
//!
//! `Services` holds the shared store and cache handles and implements
//! `Handler<R>` for every request type. Reads go through the read-through
//! cache; writes go through the conditional write evaluator and are followed
//! by cache invalidation once the store has committed.

mod projects;
mod tasks;

pub use projects::{CreateProject, DeleteProject, GetProjectById, ListProjects, UpdateProject};
pub use tasks::{
    CreateTask, DeleteTask, GetTaskById, GetTaskStatistics, ListTasks, UpdateTask,
    UpdateTaskStatus,
};

use std::sync::Arc;

use trackwise_core::{
    Clock, Document, EntityId, EntityKind, Page, PageRequest, Project, Task, TrackError,
    TrackResult, Versioned,
};
use trackwise_storage::{CacheKey, EntityStore, InvalidationCoordinator, ReadThroughCache};

use crate::conditional::ConditionalWrite;

/// Shared dependencies of every handler.
#[derive(Clone)]
pub struct Services {
    pub projects: Arc<dyn EntityStore<Project>>,
    pub tasks: Arc<dyn EntityStore<Task>>,
    pub cache: Arc<ReadThroughCache>,
    pub invalidation: InvalidationCoordinator,
    pub clock: Arc<dyn Clock>,
}

impl Services {
    pub fn new(
        projects: Arc<dyn EntityStore<Project>>,
        tasks: Arc<dyn EntityStore<Task>>,
        cache: Arc<ReadThroughCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            invalidation: InvalidationCoordinator::new(cache.clone()),
            projects,
            tasks,
            cache,
            clock,
        }
    }

    /// Live document by id, served from cache when possible.
    async fn cached<D: Document>(
        &self,
        store: &dyn EntityStore<D>,
        id: EntityId,
    ) -> TrackResult<Option<D>> {
        let key = CacheKey::entity(D::KIND, id);
        let ttl = self.cache.config().entity_ttl;
        self.cache
            .get_or_load(&key, ttl, move || async move {
                store.get_by_id(id).await.map_err(TrackError::from)
            })
            .await
    }

    /// One page of a scope listing, served from cache when possible.
    async fn cached_page<D: Document>(
        &self,
        store: &dyn EntityStore<D>,
        scope: &str,
        filter: &D::Filter,
        page: PageRequest,
    ) -> TrackResult<Page<Versioned<D>>> {
        let key = CacheKey::page::<D>(scope, filter, page);
        let ttl = self.cache.config().list_ttl;
        let loaded = self
            .cache
            .get_or_load(&key, ttl, move || async move {
                let (items, total) = store.get_by_scope(scope, filter, page.window()).await?;
                Ok::<_, TrackError>(Some(Page::new(items, page, total)))
            })
            .await?;
        let page = loaded.unwrap_or_else(|| Page::new(Vec::new(), page, 0));
        Ok(page.map(Versioned::from_document))
    }

    /// The live project `id`, provided `actor` owns it.
    async fn owned_project(&self, id: EntityId, actor: &str) -> TrackResult<Project> {
        let project = self
            .cached(self.projects.as_ref(), id)
            .await?
            .ok_or_else(|| TrackError::not_found(EntityKind::Project, id))?;
        if project.owner_id != actor {
            return Err(TrackError::forbidden(EntityKind::Project, id));
        }
        Ok(project)
    }

    /// The live task `id`, provided `actor` owns its live parent project.
    async fn owned_task(&self, id: EntityId, actor: &str) -> TrackResult<Task> {
        let task = self
            .cached(self.tasks.as_ref(), id)
            .await?
            .ok_or_else(|| TrackError::not_found(EntityKind::Task, id))?;
        match self.owned_project(task.project_id, actor).await {
            Ok(_) => Ok(task),
            Err(TrackError::NotFound { .. }) => Err(TrackError::not_found(EntityKind::Task, id)),
            Err(TrackError::Forbidden { .. }) => Err(TrackError::forbidden(EntityKind::Task, id)),
            Err(other) => Err(other),
        }
    }

    fn project_writer(&self) -> ConditionalWrite<'_, Project> {
        ConditionalWrite::new(self.projects.as_ref())
    }

    fn task_writer(&self) -> ConditionalWrite<'_, Task> {
        ConditionalWrite::new(self.tasks.as_ref())
    }
}

/// Trim and drop blank optional text.
fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
