//! Project and task entities.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::{Document, DocumentFilter, EntityKind, NoFilter};
use crate::{new_entity_id, EntityId, Timestamp};

// ============================================================================
// PROJECT
// ============================================================================

/// A project owned by a single subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: EntityId,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub created_by: String,
    pub updated_by: String,
    pub is_deleted: bool,
}

impl Project {
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        description: Option<String>,
        now: Timestamp,
    ) -> Self {
        let owner_id = owner_id.into();
        Self {
            id: new_entity_id(),
            created_by: owner_id.clone(),
            updated_by: owner_id.clone(),
            owner_id,
            name: name.into(),
            description,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        }
    }

    pub fn touch(&mut self, actor: &str, at: Timestamp) {
        self.updated_by = actor.to_string();
        self.updated_at = at;
    }
}

impl Document for Project {
    const KIND: EntityKind = EntityKind::Project;
    type Filter = NoFilter;

    fn id(&self) -> EntityId {
        self.id
    }

    fn scope(&self) -> String {
        self.owner_id.clone()
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn mark_deleted(&mut self) {
        self.is_deleted = true;
    }

    /// Task pages and statistics of this project are keyed under its id.
    fn dependent_scopes(&self) -> Vec<(EntityKind, String)> {
        vec![(EntityKind::Task, self.id.to_string())]
    }
}

// ============================================================================
// TASK
// ============================================================================

/// Workflow state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    New,
    InProgress,
    Blocked,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::New,
        TaskStatus::InProgress,
        TaskStatus::Blocked,
        TaskStatus::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::New => "new",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "new" => Ok(TaskStatus::New),
            "in_progress" | "inprogress" => Ok(TaskStatus::InProgress),
            "blocked" => Ok(TaskStatus::Blocked),
            "done" => Ok(TaskStatus::Done),
            _ => Err(format!("unknown task status: {}", s)),
        }
    }
}

/// Task urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Low, Priority::Medium, Priority::High, Priority::Urgent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(format!("unknown priority: {}", s)),
        }
    }
}

/// A unit of work inside a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: EntityId,
    pub project_id: EntityId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assignee_user_id: Option<String>,
    pub due_date: Option<Timestamp>,
    pub tags: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub created_by: String,
    pub updated_by: String,
    pub is_deleted: bool,
}

impl Task {
    /// New task in status `New` with medium priority.
    pub fn new(project_id: EntityId, title: impl Into<String>, actor: &str, now: Timestamp) -> Self {
        Self {
            id: new_entity_id(),
            project_id,
            title: title.into(),
            description: None,
            status: TaskStatus::New,
            priority: Priority::default(),
            assignee_user_id: None,
            due_date: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            created_by: actor.to_string(),
            updated_by: actor.to_string(),
            is_deleted: false,
        }
    }

    pub fn touch(&mut self, actor: &str, at: Timestamp) {
        self.updated_by = actor.to_string();
        self.updated_at = at;
    }

    pub fn is_overdue(&self, now: Timestamp) -> bool {
        self.status != TaskStatus::Done && self.due_date.is_some_and(|due| due < now)
    }
}

impl Document for Task {
    const KIND: EntityKind = EntityKind::Task;
    type Filter = TaskFilter;

    fn id(&self) -> EntityId {
        self.id
    }

    fn scope(&self) -> String {
        self.project_id.to_string()
    }

    fn unique_key(&self) -> Option<String> {
        None
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn mark_deleted(&mut self) {
        self.is_deleted = true;
    }
}

/// Optional status filter for task listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
}

impl DocumentFilter<Task> for TaskFilter {
    fn matches(&self, doc: &Task) -> bool {
        self.status.is_none_or(|status| doc.status == status)
    }

    fn field_constraints(&self) -> Vec<(&'static str, String)> {
        self.status
            .map(|status| vec![("status", status.as_str().to_string())])
            .unwrap_or_default()
    }

    fn cache_segment(&self) -> Option<String> {
        Some(
            self.status
                .map(|status| status.as_str().to_string())
                .unwrap_or_else(|| "all".to_string()),
        )
    }
}

/// Per-project aggregate over live tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatistics {
    pub project_id: EntityId,
    pub total: u64,
    pub by_status: BTreeMap<TaskStatus, u64>,
    pub by_priority: BTreeMap<Priority, u64>,
    pub overdue: u64,
    pub completion_percentage: f64,
}

impl TaskStatistics {
    pub fn compute(project_id: EntityId, tasks: &[Task], now: Timestamp) -> Self {
        let mut by_status: BTreeMap<TaskStatus, u64> =
            TaskStatus::ALL.iter().map(|s| (*s, 0)).collect();
        let mut by_priority: BTreeMap<Priority, u64> =
            Priority::ALL.iter().map(|p| (*p, 0)).collect();
        let mut overdue = 0;

        for task in tasks.iter().filter(|t| !t.is_deleted) {
            *by_status.entry(task.status).or_default() += 1;
            *by_priority.entry(task.priority).or_default() += 1;
            if task.is_overdue(now) {
                overdue += 1;
            }
        }

        let total: u64 = by_status.values().sum();
        let done = by_status.get(&TaskStatus::Done).copied().unwrap_or(0);
        let completion_percentage = if total == 0 {
            0.0
        } else {
            ((done as f64 / total as f64) * 10_000.0).round() / 100.0
        };

        Self {
            project_id,
            total,
            by_status,
            by_priority,
            overdue,
            completion_percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn now() -> Timestamp {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_project_document_keys() {
        let project = Project::new("o1", "Alpha", None, now());
        assert_eq!(project.scope(), "o1");
        assert_eq!(project.unique_key().as_deref(), Some("Alpha"));
        assert_eq!(project.created_by, "o1");
        assert_eq!(
            project.dependent_scopes(),
            vec![(EntityKind::Task, project.id.to_string())]
        );
    }

    #[test]
    fn test_project_null_description_round_trips_as_null() {
        let project = Project::new("o1", "Alpha", None, now());
        let json = serde_json::to_value(&project).unwrap();
        assert!(json["description"].is_null());
        let back: Project = serde_json::from_value(json).unwrap();
        assert_eq!(back.description, None);
    }

    #[test]
    fn test_task_scope_is_parent_project() {
        let project_id = new_entity_id();
        let task = Task::new(project_id, "Write docs", "o1", now());
        assert_eq!(task.scope(), project_id.to_string());
        assert_eq!(task.unique_key(), None);
        assert_eq!(task.status, TaskStatus::New);
        assert_eq!(task.priority, Priority::Medium);
    }

    #[test]
    fn test_status_parsing_and_wire_form() {
        assert_eq!("In_Progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert_eq!("in-progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert!("later".parse::<TaskStatus>().is_err());
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).unwrap(),
            serde_json::json!("in_progress")
        );
    }

    #[test]
    fn test_task_filter() {
        let mut task = Task::new(new_entity_id(), "Ship", "o1", now());
        let filter = TaskFilter { status: Some(TaskStatus::Done) };
        assert!(!filter.matches(&task));
        task.status = TaskStatus::Done;
        assert!(filter.matches(&task));
        assert_eq!(filter.field_constraints(), vec![("status", "done".to_string())]);
        assert_eq!(filter.cache_segment().as_deref(), Some("done"));
        assert_eq!(TaskFilter::default().cache_segment().as_deref(), Some("all"));
    }

    #[test]
    fn test_statistics() {
        let project_id = new_entity_id();
        let mut done = Task::new(project_id, "Done one", "o1", now());
        done.status = TaskStatus::Done;
        done.due_date = Some(now() - Duration::days(1));
        let mut late = Task::new(project_id, "Late one", "o1", now());
        late.priority = Priority::Urgent;
        late.due_date = Some(now() - Duration::days(1));
        let mut gone = Task::new(project_id, "Gone", "o1", now());
        gone.is_deleted = true;
        let open = Task::new(project_id, "Open", "o1", now());

        let stats = TaskStatistics::compute(project_id, &[done, late, gone, open], now());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_status[&TaskStatus::Done], 1);
        assert_eq!(stats.by_status[&TaskStatus::New], 2);
        assert_eq!(stats.by_priority[&Priority::Urgent], 1);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.completion_percentage, 33.33);
    }

    #[test]
    fn test_statistics_empty_project() {
        let stats = TaskStatistics::compute(new_entity_id(), &[], now());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.completion_percentage, 0.0);
    }
}
