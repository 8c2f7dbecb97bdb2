//! Cache invalidation after committed writes.
//!
//! Runs after the store has committed, never before. Eviction failures are
//! logged and reported but never retried and never turned into an error for
//! the caller: the write already happened, and TTL bounds any staleness left
//! behind.

use std::sync::Arc;

use trackwise_core::Document;

use super::key::{CacheKey, KeyPattern};
use super::read_through::ReadThroughCache;

/// Kind of committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Created,
    Updated,
    Deleted,
}

/// What an invalidation pass touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Exact keys evicted.
    pub keys: Vec<String>,
    /// Patterns evicted.
    pub patterns: Vec<String>,
    /// Entries the backend reported as removed.
    pub removed: u64,
    /// Keys or patterns whose eviction failed.
    pub failures: Vec<String>,
}

impl InvalidationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Evicts every cache key a committed write may have made stale.
#[derive(Clone)]
pub struct InvalidationCoordinator {
    cache: Arc<ReadThroughCache>,
}

impl InvalidationCoordinator {
    pub fn new(cache: Arc<ReadThroughCache>) -> Self {
        Self { cache }
    }

    /// Keys and patterns affected by `mutation` of `doc`.
    ///
    /// A created document has no entity key cached yet but appears in its
    /// scope's listings. Deletion also reaches the dependent scopes.
    pub fn targets<D: Document>(doc: &D, mutation: Mutation) -> (Vec<CacheKey>, Vec<KeyPattern>) {
        let mut keys = Vec::new();
        if mutation != Mutation::Created {
            keys.push(CacheKey::entity(D::KIND, doc.id()));
        }

        let mut patterns = vec![KeyPattern::list_scope(D::KIND, &doc.scope())];
        if mutation == Mutation::Deleted {
            patterns.extend(
                doc.dependent_scopes()
                    .iter()
                    .map(|(kind, scope)| KeyPattern::list_scope(*kind, scope)),
            );
        }
        (keys, patterns)
    }

    pub async fn on_created<D: Document>(&self, doc: &D) -> InvalidationReport {
        self.invalidate(doc, Mutation::Created).await
    }

    pub async fn on_updated<D: Document>(&self, doc: &D) -> InvalidationReport {
        self.invalidate(doc, Mutation::Updated).await
    }

    pub async fn on_deleted<D: Document>(&self, doc: &D) -> InvalidationReport {
        self.invalidate(doc, Mutation::Deleted).await
    }

    pub async fn invalidate<D: Document>(&self, doc: &D, mutation: Mutation) -> InvalidationReport {
        let (keys, patterns) = Self::targets(doc, mutation);
        let mut report = InvalidationReport::default();

        for key in keys {
            match self.cache.remove(&key).await {
                Ok(existed) => report.removed += u64::from(existed),
                Err(err) => {
                    tracing::warn!(
                        kind = %D::KIND,
                        id = %doc.id(),
                        key = key.as_str(),
                        error = %err,
                        "Cache key eviction failed"
                    );
                    report.failures.push(key.as_str().to_string());
                }
            }
            report.keys.push(key.as_str().to_string());
        }

        for pattern in patterns {
            match self.cache.remove_by_pattern(&pattern).await {
                Ok(removed) => report.removed += removed,
                Err(err) => {
                    tracing::warn!(
                        kind = %D::KIND,
                        id = %doc.id(),
                        pattern = pattern.as_str(),
                        error = %err,
                        "Cache pattern eviction failed"
                    );
                    report.failures.push(pattern.as_str().to_string());
                }
            }
            report.patterns.push(pattern.as_str().to_string());
        }

        tracing::debug!(
            kind = %D::KIND,
            id = %doc.id(),
            ?mutation,
            removed = report.removed,
            failures = report.failures.len(),
            "Cache invalidated"
        );
        report
    }
}
