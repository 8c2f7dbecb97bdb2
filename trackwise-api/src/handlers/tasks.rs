//! Task commands and queries.
//!
//! Every task operation is authorized against the parent project: the caller
//! must own it, and a deleted parent makes its tasks unreachable.

use async_trait::async_trait;
use trackwise_core::{
    next_modification, EntityId, ExpectedVersion, Page, PageRequest, PageWindow, Priority, Task,
    TaskFilter, TaskStatistics, TaskStatus, Timestamp, TrackError, TrackResult, Versioned,
    MAX_PAGE_SIZE,
};
use trackwise_storage::{CacheKey, WriteOutcome};

use super::{normalize, Services};
use crate::pipeline::{rule, Handler, Request, Validate, Validator};
use crate::validation::{
    validate_due_date, validate_id, validate_tags, ValidateRange, ValidateText,
    TASK_DESCRIPTION_MAX, TASK_TITLE_MAX, TASK_TITLE_MIN,
};

#[derive(Debug, Clone)]
pub struct CreateTask {
    pub project_id: EntityId,
    pub actor: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub assignee_user_id: Option<String>,
    pub due_date: Option<Timestamp>,
    pub tags: Vec<String>,
}

/// Full replacement of a task's editable fields.
#[derive(Debug, Clone)]
pub struct UpdateTask {
    pub id: EntityId,
    pub actor: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assignee_user_id: Option<String>,
    pub due_date: Option<Timestamp>,
    pub tags: Vec<String>,
    pub expected: Option<ExpectedVersion>,
}

#[derive(Debug, Clone)]
pub struct UpdateTaskStatus {
    pub id: EntityId,
    pub actor: String,
    pub status: TaskStatus,
    pub expected: Option<ExpectedVersion>,
}

#[derive(Debug, Clone)]
pub struct DeleteTask {
    pub id: EntityId,
    pub actor: String,
    pub expected: Option<ExpectedVersion>,
}

#[derive(Debug, Clone)]
pub struct GetTaskById {
    pub id: EntityId,
    pub requester: String,
}

#[derive(Debug, Clone)]
pub struct ListTasks {
    pub project_id: EntityId,
    pub requester: String,
    pub status: Option<TaskStatus>,
    pub page: PageRequest,
}

#[derive(Debug, Clone)]
pub struct GetTaskStatistics {
    pub project_id: EntityId,
    pub requester: String,
}

impl Request for CreateTask {
    const NAME: &'static str = "CreateTask";
    type Response = Versioned<Task>;
}

impl Request for UpdateTask {
    const NAME: &'static str = "UpdateTask";
    type Response = Versioned<Task>;
}

impl Request for UpdateTaskStatus {
    const NAME: &'static str = "UpdateTaskStatus";
    type Response = Versioned<Task>;
}

impl Request for DeleteTask {
    const NAME: &'static str = "DeleteTask";
    type Response = ();
}

impl Request for GetTaskById {
    const NAME: &'static str = "GetTaskById";
    type Response = Versioned<Task>;
}

impl Request for ListTasks {
    const NAME: &'static str = "ListTasks";
    type Response = Page<Versioned<Task>>;
}

impl Request for GetTaskStatistics {
    const NAME: &'static str = "GetTaskStatistics";
    type Response = TaskStatistics;
}

impl Validate for CreateTask {
    fn validators() -> Vec<Box<dyn Validator<Self>>> {
        vec![
            rule(|r: &Self| validate_id(&r.project_id, "project_id")),
            rule(|r: &Self| r.actor.validate_non_blank("actor")),
            rule(|r: &Self| r.title.validate_length("title", TASK_TITLE_MIN, TASK_TITLE_MAX)),
            rule(|r: &Self| r.description.validate_max_length("description", TASK_DESCRIPTION_MAX)),
            rule(|r: &Self| validate_tags(&r.tags)),
            rule(|r: &Self| validate_due_date(r.due_date)),
        ]
    }
}

impl Validate for UpdateTask {
    fn validators() -> Vec<Box<dyn Validator<Self>>> {
        vec![
            rule(|r: &Self| validate_id(&r.id, "id")),
            rule(|r: &Self| r.actor.validate_non_blank("actor")),
            rule(|r: &Self| r.title.validate_length("title", TASK_TITLE_MIN, TASK_TITLE_MAX)),
            rule(|r: &Self| r.description.validate_max_length("description", TASK_DESCRIPTION_MAX)),
            rule(|r: &Self| validate_tags(&r.tags)),
            rule(|r: &Self| validate_due_date(r.due_date)),
        ]
    }
}

impl Validate for UpdateTaskStatus {
    fn validators() -> Vec<Box<dyn Validator<Self>>> {
        vec![
            rule(|r: &Self| validate_id(&r.id, "id")),
            rule(|r: &Self| r.actor.validate_non_blank("actor")),
        ]
    }
}

impl Validate for DeleteTask {
    fn validators() -> Vec<Box<dyn Validator<Self>>> {
        vec![
            rule(|r: &Self| validate_id(&r.id, "id")),
            rule(|r: &Self| r.actor.validate_non_blank("actor")),
        ]
    }
}

impl Validate for GetTaskById {
    fn validators() -> Vec<Box<dyn Validator<Self>>> {
        vec![
            rule(|r: &Self| validate_id(&r.id, "id")),
            rule(|r: &Self| r.requester.validate_non_blank("requester")),
        ]
    }
}

impl Validate for ListTasks {
    fn validators() -> Vec<Box<dyn Validator<Self>>> {
        vec![
            rule(|r: &Self| validate_id(&r.project_id, "project_id")),
            rule(|r: &Self| r.requester.validate_non_blank("requester")),
            rule(|r: &Self| r.page.page_number.validate_range("page_number", 1, u32::MAX)),
            rule(|r: &Self| r.page.page_size.validate_range("page_size", 1, MAX_PAGE_SIZE)),
        ]
    }
}

impl Validate for GetTaskStatistics {
    fn validators() -> Vec<Box<dyn Validator<Self>>> {
        vec![
            rule(|r: &Self| validate_id(&r.project_id, "project_id")),
            rule(|r: &Self| r.requester.validate_non_blank("requester")),
        ]
    }
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter().map(|tag| tag.trim().to_string()).collect()
}

#[async_trait]
impl Handler<CreateTask> for Services {
    async fn handle(&self, request: CreateTask) -> TrackResult<Versioned<Task>> {
        let project = self.owned_project(request.project_id, &request.actor).await?;

        let mut task = Task::new(
            project.id,
            request.title.trim(),
            request.actor.trim(),
            self.clock.now(),
        );
        task.description = normalize(request.description);
        task.priority = request.priority.unwrap_or_default();
        task.assignee_user_id = normalize(request.assignee_user_id);
        task.due_date = request.due_date;
        task.tags = clean_tags(request.tags);

        match self.tasks.create(&task).await? {
            WriteOutcome::Applied => {}
            other => {
                return Err(TrackError::Unavailable {
                    reason: format!("unexpected create outcome {:?}", other),
                })
            }
        }

        self.invalidation.on_created(&task).await;
        tracing::info!(task_id = %task.id, project_id = %task.project_id, "Task created");
        Ok(Versioned::from_document(task))
    }
}

#[async_trait]
impl Handler<UpdateTask> for Services {
    async fn handle(&self, request: UpdateTask) -> TrackResult<Versioned<Task>> {
        self.owned_task(request.id, &request.actor).await?;

        let title = request.title.trim().to_string();
        let description = normalize(request.description);
        let assignee = normalize(request.assignee_user_id);
        let tags = clean_tags(request.tags);
        let clock = self.clock.as_ref();
        let actor = request.actor.as_str();

        let updated = self
            .task_writer()
            .update(request.id, request.expected.as_ref(), |current: &Task| {
                let mut next = current.clone();
                next.title = title.clone();
                next.description = description.clone();
                next.status = request.status;
                next.priority = request.priority;
                next.assignee_user_id = assignee.clone();
                next.due_date = request.due_date;
                next.tags = tags.clone();
                next.touch(actor, next_modification(clock, current.updated_at));
                Ok(next)
            })
            .await?;

        self.invalidation.on_updated(&updated).await;
        tracing::info!(task_id = %updated.id, "Task updated");
        Ok(Versioned::from_document(updated))
    }
}

#[async_trait]
impl Handler<UpdateTaskStatus> for Services {
    async fn handle(&self, request: UpdateTaskStatus) -> TrackResult<Versioned<Task>> {
        self.owned_task(request.id, &request.actor).await?;

        let clock = self.clock.as_ref();
        let actor = request.actor.as_str();
        let status = request.status;

        let updated = self
            .task_writer()
            .update(request.id, request.expected.as_ref(), |current: &Task| {
                let mut next = current.clone();
                next.status = status;
                next.touch(actor, next_modification(clock, current.updated_at));
                Ok(next)
            })
            .await?;

        self.invalidation.on_updated(&updated).await;
        tracing::info!(task_id = %updated.id, status = %updated.status, "Task status changed");
        Ok(Versioned::from_document(updated))
    }
}

#[async_trait]
impl Handler<DeleteTask> for Services {
    async fn handle(&self, request: DeleteTask) -> TrackResult<()> {
        self.owned_task(request.id, &request.actor).await?;

        let deleted = self
            .task_writer()
            .delete(request.id, request.expected.as_ref())
            .await?;

        self.invalidation.on_deleted(&deleted).await;
        tracing::info!(task_id = %deleted.id, "Task deleted");
        Ok(())
    }
}

#[async_trait]
impl Handler<GetTaskById> for Services {
    async fn handle(&self, request: GetTaskById) -> TrackResult<Versioned<Task>> {
        let task = self.owned_task(request.id, &request.requester).await?;
        Ok(Versioned::from_document(task))
    }
}

#[async_trait]
impl Handler<ListTasks> for Services {
    async fn handle(&self, request: ListTasks) -> TrackResult<Page<Versioned<Task>>> {
        self.owned_project(request.project_id, &request.requester).await?;
        let filter = TaskFilter {
            status: request.status,
        };
        let scope = request.project_id.to_string();
        self.cached_page(self.tasks.as_ref(), &scope, &filter, request.page)
            .await
    }
}

#[async_trait]
impl Handler<GetTaskStatistics> for Services {
    async fn handle(&self, request: GetTaskStatistics) -> TrackResult<TaskStatistics> {
        self.owned_project(request.project_id, &request.requester).await?;

        let key = CacheKey::task_statistics(request.project_id);
        let ttl = self.cache.config().list_ttl;
        let project_id = request.project_id;
        let store = self.tasks.as_ref();
        let now = self.clock.now();

        let stats = self
            .cache
            .get_or_load(&key, ttl, move || async move {
                let scope = project_id.to_string();
                let (tasks, _) = store
                    .get_by_scope(&scope, &TaskFilter::default(), PageWindow::ALL)
                    .await?;
                Ok::<_, TrackError>(Some(TaskStatistics::compute(project_id, &tasks, now)))
            })
            .await?;

        Ok(stats.unwrap_or_else(|| TaskStatistics::compute(project_id, &[], now)))
    }
}
