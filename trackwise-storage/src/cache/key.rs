//! Cache key namespace.
//!
//! Key layout:
//!
//! ```text
//! projects:{id}                                  single project
//! tasks:{id}                                     single task
//! projects:list:{owner}:{page}:{size}            project page
//! tasks:list:{project}:{status|all}:{page}:{size} task page
//! tasks:list:{project}:stats                     task statistics
//! ```
//!
//! Everything derived from a scope's listing lives under
//! `{kind}:list:{scope}:`, so one pattern evicts all of it. Keys keep raw
//! segments; patterns escape glob metacharacters in the scope segment.
//!
//! Each key also carries a fence scope, the unit the read-through cache
//! tracks invalidation epochs for.

use std::fmt;

use trackwise_core::{Document, DocumentFilter, EntityId, EntityKind, PageRequest};

use super::glob;

/// A concrete cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    key: String,
    fence: String,
}

impl CacheKey {
    /// Key of a single entity.
    pub fn entity(kind: EntityKind, id: EntityId) -> Self {
        let key = format!("{}:{}", kind.cache_prefix(), id);
        Self {
            fence: key.clone(),
            key,
        }
    }

    /// Key of a derived value under a scope's listing namespace.
    pub fn list(kind: EntityKind, scope: &str, segments: &[String]) -> Self {
        let fence = list_namespace(kind, scope);
        let key = if segments.is_empty() {
            format!("{}:", fence)
        } else {
            format!("{}:{}", fence, segments.join(":"))
        };
        Self { key, fence }
    }

    /// Key of one page of a filtered scope listing.
    pub fn page<D: Document>(scope: &str, filter: &D::Filter, page: PageRequest) -> Self {
        let mut segments = Vec::with_capacity(3);
        if let Some(segment) = filter.cache_segment() {
            segments.push(segment);
        }
        segments.push(page.page_number.to_string());
        segments.push(page.page_size.to_string());
        Self::list(D::KIND, scope, &segments)
    }

    /// Key of a project's task statistics.
    pub fn task_statistics(project_id: EntityId) -> Self {
        Self::list(EntityKind::Task, &project_id.to_string(), &["stats".to_string()])
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Scope whose invalidation epoch guards population of this key.
    pub fn fence_scope(&self) -> &str {
        &self.fence
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// A glob pattern over cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPattern {
    pattern: String,
    fence: String,
}

impl KeyPattern {
    /// Every key under a scope's listing namespace.
    pub fn list_scope(kind: EntityKind, scope: &str) -> Self {
        Self {
            pattern: format!("{}:list:{}:*", kind.cache_prefix(), glob::escape(scope)),
            fence: list_namespace(kind, scope),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn fence_scope(&self) -> &str {
        &self.fence
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

fn list_namespace(kind: EntityKind, scope: &str) -> String {
    format!("{}:list:{}", kind.cache_prefix(), scope)
}
