//! Trackwise Core - Entity Types
//!
//! Pure data structures shared by the storage and API crates: identities,
//! version tags, the document abstraction, paging and the error taxonomy.
//! This crate performs no I/O.

pub mod clock;
pub mod document;
pub mod entities;
pub mod error;
pub mod identity;
pub mod page;
pub mod version;

pub use clock::{next_modification, truncate_to_micros, Clock, SystemClock};
pub use document::{Document, DocumentFilter, EntityKind, NoFilter};
pub use entities::{Priority, Project, Task, TaskFilter, TaskStatistics, TaskStatus};
pub use error::{ErrorCode, FieldError, StorageError, StorageResult, TrackError, TrackResult};
pub use identity::{new_entity_id, EntityId, Timestamp};
pub use page::{Page, PageRequest, PageWindow, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use version::{ExpectedVersion, VersionTag, Versioned};
