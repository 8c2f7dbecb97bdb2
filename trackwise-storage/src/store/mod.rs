//! Durable entity storage.
//!
//! Every store honours the same contract:
//!
//! - soft-deleted documents are invisible to every read;
//! - `create` and `update` reject a unique key already held by another live
//!   document of the same kind and scope, atomically with the write;
//! - `update` and `delete` with an expected `updated_at` only apply when the
//!   stored document is still live and at that exact timestamp.

mod memory;
mod postgres;

pub use memory::InMemoryEntityStore;
pub use postgres::{ensure_schema, DbConfig, PgEntityStore};

use async_trait::async_trait;
use trackwise_core::{Document, EntityId, PageWindow, StorageResult, Timestamp};

/// Result of a guarded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write was committed.
    Applied,
    /// No live document with that id exists.
    Missing,
    /// The live document's `updated_at` differs from the expected one.
    VersionMismatch,
    /// Another live document in the scope holds the same unique key.
    Duplicate,
}

/// Persistent collection of one document kind.
#[async_trait]
pub trait EntityStore<D: Document>: Send + Sync {
    /// Live document by id.
    async fn get_by_id(&self, id: EntityId) -> StorageResult<Option<D>>;

    /// Live documents of a scope matching `filter`, newest first, windowed.
    /// Also returns the total number of matches before windowing.
    async fn get_by_scope(
        &self,
        scope: &str,
        filter: &D::Filter,
        window: PageWindow,
    ) -> StorageResult<(Vec<D>, u64)>;

    /// Insert a new document. Returns `Applied` or `Duplicate`.
    async fn create(&self, doc: &D) -> StorageResult<WriteOutcome>;

    /// Replace the live document with `doc.id()`.
    ///
    /// With `expected_updated_at` set, the replace is a compare-and-swap on
    /// the stored `updated_at`. Without it the last writer wins.
    async fn update(
        &self,
        doc: &D,
        expected_updated_at: Option<Timestamp>,
    ) -> StorageResult<WriteOutcome>;

    /// Soft-delete. An already deleted or absent document is `Missing`.
    async fn delete(
        &self,
        id: EntityId,
        expected_updated_at: Option<Timestamp>,
    ) -> StorageResult<WriteOutcome>;

    /// Whether a live document other than `exclude` holds `key` in `scope`.
    async fn exists_by_unique_key(
        &self,
        scope: &str,
        key: &str,
        exclude: Option<EntityId>,
    ) -> StorageResult<bool>;
}
