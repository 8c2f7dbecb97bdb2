//! In-memory entity store.
//!
//! All guarded writes run under a single write lock, which makes the
//! uniqueness check and the compare-and-swap atomic with the mutation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use trackwise_core::{
    Document, DocumentFilter, EntityId, PageWindow, StorageError, StorageResult, Timestamp,
};

use super::{EntityStore, WriteOutcome};

/// Process-local store used in tests and single-node development.
#[derive(Debug)]
pub struct InMemoryEntityStore<D> {
    docs: RwLock<HashMap<EntityId, D>>,
    available: AtomicBool,
}

impl<D> Default for InMemoryEntityStore<D> {
    fn default() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl<D: Document> InMemoryEntityStore<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored documents, deleted ones included.
    pub async fn raw_len(&self) -> usize {
        self.docs.read().await.len()
    }

    fn ensure_available(&self) -> StorageResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable {
                reason: format!("{} store is offline", D::KIND.as_str()),
            })
        }
    }
}

fn holds_key<D: Document>(
    docs: &HashMap<EntityId, D>,
    scope: &str,
    key: &str,
    exclude: Option<EntityId>,
) -> bool {
    docs.values().any(|doc| {
        !doc.is_deleted()
            && Some(doc.id()) != exclude
            && doc.scope() == scope
            && doc.unique_key().as_deref() == Some(key)
    })
}

fn conflicts<D: Document>(docs: &HashMap<EntityId, D>, candidate: &D) -> bool {
    match candidate.unique_key() {
        Some(key) => holds_key(docs, &candidate.scope(), &key, Some(candidate.id())),
        None => false,
    }
}

#[async_trait]
impl<D: Document> EntityStore<D> for InMemoryEntityStore<D> {
    async fn get_by_id(&self, id: EntityId) -> StorageResult<Option<D>> {
        self.ensure_available()?;
        let docs = self.docs.read().await;
        Ok(docs.get(&id).filter(|doc| !doc.is_deleted()).cloned())
    }

    async fn get_by_scope(
        &self,
        scope: &str,
        filter: &D::Filter,
        window: PageWindow,
    ) -> StorageResult<(Vec<D>, u64)> {
        self.ensure_available()?;
        let docs = self.docs.read().await;
        let mut matching: Vec<&D> = docs
            .values()
            .filter(|doc| !doc.is_deleted() && doc.scope() == scope && filter.matches(doc))
            .collect();
        matching.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });

        let total = matching.len() as u64;
        let skip = usize::try_from(window.skip).unwrap_or(usize::MAX);
        let take = usize::try_from(window.take).unwrap_or(usize::MAX);
        let page = matching.into_iter().skip(skip).take(take).cloned().collect();
        Ok((page, total))
    }

    async fn create(&self, doc: &D) -> StorageResult<WriteOutcome> {
        self.ensure_available()?;
        let mut docs = self.docs.write().await;
        if docs.contains_key(&doc.id()) || conflicts(&docs, doc) {
            return Ok(WriteOutcome::Duplicate);
        }
        docs.insert(doc.id(), doc.clone());
        Ok(WriteOutcome::Applied)
    }

    async fn update(
        &self,
        doc: &D,
        expected_updated_at: Option<Timestamp>,
    ) -> StorageResult<WriteOutcome> {
        self.ensure_available()?;
        let mut docs = self.docs.write().await;
        let current_updated_at = match docs.get(&doc.id()).filter(|current| !current.is_deleted()) {
            Some(current) => current.updated_at(),
            None => return Ok(WriteOutcome::Missing),
        };
        if expected_updated_at.is_some_and(|expected| expected != current_updated_at) {
            return Ok(WriteOutcome::VersionMismatch);
        }
        if conflicts(&docs, doc) {
            return Ok(WriteOutcome::Duplicate);
        }
        docs.insert(doc.id(), doc.clone());
        Ok(WriteOutcome::Applied)
    }

    async fn delete(
        &self,
        id: EntityId,
        expected_updated_at: Option<Timestamp>,
    ) -> StorageResult<WriteOutcome> {
        self.ensure_available()?;
        let mut docs = self.docs.write().await;
        let Some(current) = docs.get_mut(&id).filter(|current| !current.is_deleted()) else {
            return Ok(WriteOutcome::Missing);
        };
        if expected_updated_at.is_some_and(|expected| expected != current.updated_at()) {
            return Ok(WriteOutcome::VersionMismatch);
        }
        current.mark_deleted();
        Ok(WriteOutcome::Applied)
    }

    async fn exists_by_unique_key(
        &self,
        scope: &str,
        key: &str,
        exclude: Option<EntityId>,
    ) -> StorageResult<bool> {
        self.ensure_available()?;
        let docs = self.docs.read().await;
        Ok(holds_key(&docs, scope, key, exclude))
    }
}
