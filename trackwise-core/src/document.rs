//! Document abstraction shared by every stored entity.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{EntityId, Timestamp};

/// Kinds of entity the consistency layer manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Task,
}

impl EntityKind {
    /// Discriminator stored alongside each row.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Task => "task",
        }
    }

    /// Leading segment of every cache key for this kind.
    pub fn cache_prefix(&self) -> &'static str {
        match self {
            EntityKind::Project => "projects",
            EntityKind::Task => "tasks",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Project => f.write_str("Project"),
            EntityKind::Task => f.write_str("Task"),
        }
    }
}

/// A persistable, soft-deletable record with audit timestamps.
///
/// `scope` groups documents for listing (a project's owner, a task's parent
/// project). `unique_key`, when present, must be unique among live documents
/// of the same kind and scope.
pub trait Document: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    /// Listing filter accepted by `get_by_scope`.
    type Filter: DocumentFilter<Self>;

    fn id(&self) -> EntityId;
    fn scope(&self) -> String;
    fn unique_key(&self) -> Option<String>;
    fn created_at(&self) -> Timestamp;
    fn updated_at(&self) -> Timestamp;
    fn is_deleted(&self) -> bool;
    fn mark_deleted(&mut self);

    /// List scopes of other kinds that hang off this document and must be
    /// evicted when it is deleted.
    fn dependent_scopes(&self) -> Vec<(EntityKind, String)> {
        Vec::new()
    }
}

/// Equality filter applied to a scope listing.
pub trait DocumentFilter<D>: fmt::Debug + Default + Clone + Send + Sync + 'static {
    /// In-memory evaluation.
    fn matches(&self, doc: &D) -> bool;

    /// `(top-level JSON field, expected string value)` pairs, used by stores
    /// that filter server-side.
    fn field_constraints(&self) -> Vec<(&'static str, String)>;

    /// Segment distinguishing this filter in list cache keys.
    fn cache_segment(&self) -> Option<String>;
}

/// Filter that accepts every live document in the scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoFilter;

impl<D> DocumentFilter<D> for NoFilter
where
    D: Send + Sync + 'static,
{
    fn matches(&self, _doc: &D) -> bool {
        true
    }

    fn field_constraints(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn cache_segment(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(EntityKind::Project.as_str(), "project");
        assert_eq!(EntityKind::Task.cache_prefix(), "tasks");
        assert_eq!(EntityKind::Task.to_string(), "Task");
    }

    #[test]
    fn test_no_filter_accepts_everything() {
        let filter = NoFilter;
        assert!(DocumentFilter::<u32>::matches(&filter, &7));
        assert!(DocumentFilter::<u32>::field_constraints(&filter).is_empty());
        assert_eq!(DocumentFilter::<u32>::cache_segment(&filter), None);
    }
}
