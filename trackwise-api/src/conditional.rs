//! Conditional write evaluator.
//!
//! Gates every update and delete on the caller's expected version:
//!
//! 1. Load the current document from the store (never the cache). Absent or
//!    soft-deleted: `NotFound`.
//! 2. If the caller supplied an expected version, compare it against the
//!    current tag. Mismatch: `PreconditionFailed`, nothing is written.
//! 3. Commit through the store's compare-and-replace on the `updated_at`
//!    that was just read, so a write that slipped in between step 1 and the
//!    commit is caught atomically.
//!
//! Without an expected version (or with `*`) the last writer wins. The
//! store-level guard is still used, and a lost race is retried against the
//! fresh document so `updated_at` keeps increasing. Each lost race means
//! another writer committed; a write that keeps losing is reported as
//! `Unavailable`, which callers may retry, never as `PreconditionFailed`.

use trackwise_core::{
    Document, EntityId, ExpectedVersion, TrackError, TrackResult, VersionTag,
};
use trackwise_storage::{EntityStore, WriteOutcome};

const UNCONDITIONAL_ATTEMPTS: usize = 16;

pub struct ConditionalWrite<'a, D: Document> {
    store: &'a dyn EntityStore<D>,
}

impl<'a, D: Document> ConditionalWrite<'a, D> {
    pub fn new(store: &'a dyn EntityStore<D>) -> Self {
        Self { store }
    }

    /// Replace the document `id` with `apply(current)`.
    ///
    /// `apply` sees the freshly loaded document and may reject it. Returns
    /// the committed document.
    pub async fn update<F>(
        &self,
        id: EntityId,
        expected: Option<&ExpectedVersion>,
        mut apply: F,
    ) -> TrackResult<D>
    where
        F: FnMut(&D) -> TrackResult<D> + Send,
    {
        for _ in 0..UNCONDITIONAL_ATTEMPTS {
            let current = self.admit(id, expected).await?;
            let next = apply(&current)?;
            match self.store.update(&next, Some(current.updated_at())).await? {
                WriteOutcome::Applied => return Ok(next),
                WriteOutcome::Missing => return Err(TrackError::not_found(D::KIND, id)),
                WriteOutcome::Duplicate => {
                    return Err(TrackError::Duplicate {
                        kind: D::KIND,
                        scope: next.scope(),
                        key: next.unique_key().unwrap_or_default(),
                    })
                }
                WriteOutcome::VersionMismatch => {
                    if let Some(ExpectedVersion::OneOf(_)) = expected {
                        return Err(TrackError::precondition_failed(D::KIND, id));
                    }
                    tracing::debug!(kind = %D::KIND, %id, "Concurrent write, retrying");
                }
            }
        }
        Err(contended::<D>(id))
    }

    /// Soft-delete the document `id`. Returns the document as it was
    /// immediately before deletion.
    pub async fn delete(&self, id: EntityId, expected: Option<&ExpectedVersion>) -> TrackResult<D> {
        for _ in 0..UNCONDITIONAL_ATTEMPTS {
            let current = self.admit(id, expected).await?;
            match self.store.delete(id, Some(current.updated_at())).await? {
                WriteOutcome::Applied => return Ok(current),
                WriteOutcome::Missing => return Err(TrackError::not_found(D::KIND, id)),
                WriteOutcome::Duplicate => {
                    return Err(TrackError::Unavailable {
                        reason: format!("store reported a duplicate while deleting {} {}", D::KIND, id),
                    })
                }
                WriteOutcome::VersionMismatch => {
                    if let Some(ExpectedVersion::OneOf(_)) = expected {
                        return Err(TrackError::precondition_failed(D::KIND, id));
                    }
                    tracing::debug!(kind = %D::KIND, %id, "Concurrent write, retrying");
                }
            }
        }
        Err(contended::<D>(id))
    }

    /// Load the live document and check it against `expected`.
    pub async fn admit(&self, id: EntityId, expected: Option<&ExpectedVersion>) -> TrackResult<D> {
        let current = self
            .store
            .get_by_id(id)
            .await?
            .ok_or_else(|| TrackError::not_found(D::KIND, id))?;

        if let Some(expected) = expected {
            let tag = VersionTag::of(&current);
            if !expected.admits(&tag) {
                tracing::debug!(kind = %D::KIND, %id, current = %tag, "Precondition failed");
                return Err(TrackError::precondition_failed(D::KIND, id));
            }
        }
        Ok(current)
    }
}

fn contended<D: Document>(id: EntityId) -> TrackError {
    tracing::warn!(kind = %D::KIND, %id, attempts = UNCONDITIONAL_ATTEMPTS, "Write kept losing to concurrent writers");
    TrackError::Unavailable {
        reason: format!(
            "{} {} changed concurrently on {} consecutive attempts",
            D::KIND,
            id,
            UNCONDITIONAL_ATTEMPTS
        ),
    }
}
