//! Trackwise API - Consistency Layer Service
//!
//! Commands and queries for projects and tasks, run through a validation
//! and logging pipeline, with optimistic concurrency on every write and a
//! fail-open read-through cache on every read. The HTTP surface maps
//! version tags to `ETag` / `If-Match` / `If-None-Match`.

pub mod conditional;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod validation;

pub use conditional::ConditionalWrite;
pub use config::{AppConfig, CacheKind, ConfigError, LogFormat, StoreKind};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use extractors::{IfMatch, IfNoneMatch, Subject, SUBJECT_HEADER};
pub use handlers::Services;
pub use pipeline::{Handler, Logged, Mediator, Request, Validate, Validated, Validator};
pub use routes::create_router;
pub use state::AppState;
