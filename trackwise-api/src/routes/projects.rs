//! Project endpoints, including the project-scoped task collection.
//!
//! - `GET    /api/v1/projects`                  list the caller's projects
//! - `POST   /api/v1/projects`                  create
//! - `GET    /api/v1/projects/:id`              read (honours `If-None-Match`)
//! - `PUT    /api/v1/projects/:id`              replace (honours `If-Match`)
//! - `DELETE /api/v1/projects/:id`              soft delete (honours `If-Match`)
//! - `GET    /api/v1/projects/:id/tasks`        list tasks, optional `status`
//! - `POST   /api/v1/projects/:id/tasks`        create a task
//! - `GET    /api/v1/projects/:id/statistics`   task aggregate

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use trackwise_core::{Priority, TaskStatus, Timestamp};
use uuid::Uuid;

use super::{versioned, versioned_unless_current, PageQuery};
use crate::error::{ApiError, ApiResult};
use crate::extractors::{IfMatch, IfNoneMatch, Subject};
use crate::handlers::{
    CreateProject, CreateTask, DeleteProject, GetProjectById, GetTaskStatistics, ListProjects,
    ListTasks, UpdateProject,
};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectBody {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskBody {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub assignee_user_id: Option<String>,
    pub due_date: Option<Timestamp>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskListQuery {
    pub status: Option<String>,
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
}

pub async fn list_projects(
    State(state): State<AppState>,
    Subject(subject): Subject,
    Query(query): Query<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = state
        .mediator
        .send(ListProjects {
            owner_id: subject,
            page: query.to_request(),
        })
        .await?;
    Ok(Json(page))
}

pub async fn create_project(
    State(state): State<AppState>,
    Subject(subject): Subject,
    Json(body): Json<ProjectBody>,
) -> ApiResult<Response> {
    let project = state
        .mediator
        .send(CreateProject {
            owner_id: subject,
            name: body.name,
            description: body.description,
        })
        .await?;
    Ok(versioned(StatusCode::CREATED, project))
}

pub async fn get_project(
    State(state): State<AppState>,
    Subject(subject): Subject,
    IfNoneMatch(if_none_match): IfNoneMatch,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let project = state
        .mediator
        .send(GetProjectById {
            id,
            requester: subject,
        })
        .await?;
    Ok(versioned_unless_current(if_none_match.as_ref(), project))
}

pub async fn update_project(
    State(state): State<AppState>,
    Subject(subject): Subject,
    IfMatch(expected): IfMatch,
    Path(id): Path<Uuid>,
    Json(body): Json<ProjectBody>,
) -> ApiResult<Response> {
    let project = state
        .mediator
        .send(UpdateProject {
            id,
            actor: subject,
            name: body.name,
            description: body.description,
            expected,
        })
        .await?;
    Ok(versioned(StatusCode::OK, project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Subject(subject): Subject,
    IfMatch(expected): IfMatch,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .mediator
        .send(DeleteProject {
            id,
            actor: subject,
            expected,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Subject(subject): Subject,
    Path(project_id): Path<Uuid>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<impl IntoResponse> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(TaskStatus::from_str)
        .transpose()
        .map_err(|e| ApiError::invalid_input(e))?;

    let page = state
        .mediator
        .send(ListTasks {
            project_id,
            requester: subject,
            status,
            page: PageQuery {
                page_number: query.page_number,
                page_size: query.page_size,
            }
            .to_request(),
        })
        .await?;
    Ok(Json(page))
}

pub async fn create_task(
    State(state): State<AppState>,
    Subject(subject): Subject,
    Path(project_id): Path<Uuid>,
    Json(body): Json<CreateTaskBody>,
) -> ApiResult<Response> {
    let task = state
        .mediator
        .send(CreateTask {
            project_id,
            actor: subject,
            title: body.title,
            description: body.description,
            priority: body.priority,
            assignee_user_id: body.assignee_user_id,
            due_date: body.due_date,
            tags: body.tags,
        })
        .await?;
    Ok(versioned(StatusCode::CREATED, task))
}

pub async fn task_statistics(
    State(state): State<AppState>,
    Subject(subject): Subject,
    Path(project_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let stats = state
        .mediator
        .send(GetTaskStatistics {
            project_id,
            requester: subject,
        })
        .await?;
    Ok(Json(stats))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route(
            "/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/:id/tasks", get(list_tasks).post(create_task))
        .route("/:id/statistics", get(task_statistics))
}
