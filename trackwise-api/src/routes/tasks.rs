//! Task endpoints.
//!
//! - `GET    /api/v1/tasks/:id`          read (honours `If-None-Match`)
//! - `PUT    /api/v1/tasks/:id`          replace editable fields (honours `If-Match`)
//! - `PATCH  /api/v1/tasks/:id/status`   change status only (honours `If-Match`)
//! - `DELETE /api/v1/tasks/:id`          soft delete (honours `If-Match`)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use trackwise_core::{Priority, TaskStatus, Timestamp};
use uuid::Uuid;

use super::{versioned, versioned_unless_current};
use crate::error::ApiResult;
use crate::extractors::{IfMatch, IfNoneMatch, Subject};
use crate::handlers::{DeleteTask, GetTaskById, UpdateTask, UpdateTaskStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTaskBody {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    pub assignee_user_id: Option<String>,
    pub due_date: Option<Timestamp>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusBody {
    pub status: TaskStatus,
}

pub async fn get_task(
    State(state): State<AppState>,
    Subject(subject): Subject,
    IfNoneMatch(if_none_match): IfNoneMatch,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let task = state
        .mediator
        .send(GetTaskById {
            id,
            requester: subject,
        })
        .await?;
    Ok(versioned_unless_current(if_none_match.as_ref(), task))
}

pub async fn update_task(
    State(state): State<AppState>,
    Subject(subject): Subject,
    IfMatch(expected): IfMatch,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTaskBody>,
) -> ApiResult<Response> {
    let task = state
        .mediator
        .send(UpdateTask {
            id,
            actor: subject,
            title: body.title,
            description: body.description,
            status: body.status,
            priority: body.priority,
            assignee_user_id: body.assignee_user_id,
            due_date: body.due_date,
            tags: body.tags,
            expected,
        })
        .await?;
    Ok(versioned(StatusCode::OK, task))
}

pub async fn update_task_status(
    State(state): State<AppState>,
    Subject(subject): Subject,
    IfMatch(expected): IfMatch,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusBody>,
) -> ApiResult<Response> {
    let task = state
        .mediator
        .send(UpdateTaskStatus {
            id,
            actor: subject,
            status: body.status,
            expected,
        })
        .await?;
    Ok(versioned(StatusCode::OK, task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Subject(subject): Subject,
    IfMatch(expected): IfMatch,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .mediator
        .send(DeleteTask {
            id,
            actor: subject,
            expected,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/:id", get(get_task).put(update_task).delete(delete_task))
        .route("/:id/status", patch(update_task_status))
}
