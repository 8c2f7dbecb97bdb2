//! HTTP routes.
//!
//! Thin translation between HTTP and the command/query pipeline. Version
//! tags travel as `ETag` on responses and `If-Match` / `If-None-Match` on
//! requests.

pub mod health;
pub mod projects;
pub mod tasks;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use trackwise_core::{ExpectedVersion, PageRequest, VersionTag, Versioned, DEFAULT_PAGE_SIZE};

use crate::state::AppState;

/// Build the full application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .nest("/projects", projects::create_router())
        .nest("/tasks", tasks::create_router());

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health::create_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `?page_number=&page_size=` query, defaulting to the first page.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    pub fn to_request(self) -> PageRequest {
        PageRequest::new(
            self.page_number.unwrap_or(1),
            self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }
}

fn with_etag(mut response: Response, tag: &VersionTag) -> Response {
    if let Ok(value) = HeaderValue::from_str(tag.as_str()) {
        response.headers_mut().insert(header::ETAG, value);
    }
    response
}

/// JSON body of a versioned entity with its tag as `ETag`.
pub(crate) fn versioned<T: Serialize>(status: StatusCode, body: Versioned<T>) -> Response {
    let tag = body.version.clone();
    with_etag((status, Json(body)).into_response(), &tag)
}

/// `304 Not Modified` when the client's `If-None-Match` already names the
/// current tag, otherwise the full versioned body.
pub(crate) fn versioned_unless_current<T: Serialize>(
    if_none_match: Option<&ExpectedVersion>,
    body: Versioned<T>,
) -> Response {
    match if_none_match {
        Some(expected) if expected.admits(&body.version) => {
            with_etag(StatusCode::NOT_MODIFIED.into_response(), &body.version)
        }
        _ => versioned(StatusCode::OK, body),
    }
}
