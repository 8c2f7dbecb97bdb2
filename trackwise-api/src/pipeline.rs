//! Command/query pipeline.
//!
//! Every request passes through the same chain before reaching its handler:
//!
//! ```text
//! Mediator::send -> Logged -> Validated -> handler
//! ```
//!
//! `Validated` runs every validator registered for the request type and
//! short-circuits with `ValidationFailed` before the handler (and therefore
//! the store and cache) is touched. `Logged` wraps the whole call, so it
//! records validation rejections and handler panics as well as results.
//!
//! `Mediator::send` runs the chain on its own task. Dropping the returned
//! future detaches that task instead of cancelling it, so a write that has
//! committed always goes on to invalidate the cache.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::Instrument;
use trackwise_core::{FieldError, TrackError, TrackResult};

/// A command or query with a fixed response type.
pub trait Request: fmt::Debug + Send + Sync + 'static {
    /// Name used in logs.
    const NAME: &'static str;
    type Response: Send + 'static;
}

#[async_trait]
pub trait Handler<R: Request>: Send + Sync {
    async fn handle(&self, request: R) -> TrackResult<R::Response>;
}

/// A single field rule for requests of type `R`.
pub trait Validator<R>: Send + Sync {
    fn validate(&self, request: &R) -> Result<(), FieldError>;
}

/// Closure-backed validator.
pub struct Rule<F>(F);

impl<R, F> Validator<R> for Rule<F>
where
    F: Fn(&R) -> Result<(), FieldError> + Send + Sync,
{
    fn validate(&self, request: &R) -> Result<(), FieldError> {
        (self.0)(request)
    }
}

/// Box a closure as a validator.
pub fn rule<R, F>(check: F) -> Box<dyn Validator<R>>
where
    R: 'static,
    F: Fn(&R) -> Result<(), FieldError> + Send + Sync + 'static,
{
    Box::new(Rule(check))
}

/// Validators registered for a request type. Queries without rules
/// implement this with the default empty set.
pub trait Validate: Request + Sized {
    fn validators() -> Vec<Box<dyn Validator<Self>>> {
        Vec::new()
    }
}

/// Run every validator for `request` and collect the failures.
pub fn collect_failures<R: Validate>(request: &R) -> Vec<FieldError> {
    R::validators()
        .iter()
        .filter_map(|validator| validator.validate(request).err())
        .collect()
}

/// Rejects invalid requests before the inner handler runs.
pub struct Validated<H> {
    inner: H,
}

impl<H> Validated<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R, H> Handler<R> for Validated<H>
where
    R: Validate,
    H: Handler<R>,
{
    async fn handle(&self, request: R) -> TrackResult<R::Response> {
        let failures = collect_failures(&request);
        if !failures.is_empty() {
            return Err(TrackError::ValidationFailed { failures });
        }
        self.inner.handle(request).await
    }
}

/// Records start, elapsed time and outcome of the inner handler.
pub struct Logged<H> {
    inner: H,
}

impl<H> Logged<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R, H> Handler<R> for Logged<H>
where
    R: Request,
    H: Handler<R>,
{
    async fn handle(&self, request: R) -> TrackResult<R::Response> {
        let span = tracing::info_span!("request", name = R::NAME);
        async move {
            let started = Instant::now();
            tracing::info!("Handling request");

            let outcome = AssertUnwindSafe(self.inner.handle(request))
                .catch_unwind()
                .await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(Ok(response)) => {
                    tracing::info!(elapsed_ms, outcome = "OK", "Request handled");
                    Ok(response)
                }
                Ok(Err(err)) => {
                    match &err {
                        TrackError::Unavailable { .. } => {
                            tracing::error!(elapsed_ms, outcome = err.code().as_str(), error = %err, "Request failed")
                        }
                        _ => {
                            tracing::info!(elapsed_ms, outcome = err.code().as_str(), error = %err, "Request rejected")
                        }
                    }
                    Err(err)
                }
                Err(panic) => {
                    tracing::error!(elapsed_ms, outcome = "PANIC", "Request handler panicked");
                    std::panic::resume_unwind(panic)
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Entry point that sends every request through the full pipeline.
pub struct Mediator<H> {
    pipeline: Arc<Logged<Validated<H>>>,
}

impl<H> Clone for Mediator<H> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
        }
    }
}

impl<H> Mediator<H> {
    pub fn new(handler: H) -> Self {
        Self {
            pipeline: Arc::new(Logged::new(Validated::new(handler))),
        }
    }

    /// Run `request` to completion on a spawned task and wait for it.
    ///
    /// Handler panics are resumed on the caller.
    pub async fn send<R>(&self, request: R) -> TrackResult<R::Response>
    where
        R: Validate,
        H: Handler<R> + 'static,
    {
        let pipeline = self.pipeline.clone();
        let task = tokio::spawn(async move { pipeline.handle(request).await });
        match task.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => Err(TrackError::Unavailable {
                reason: format!("{} was aborted: {}", R::NAME, err),
            }),
        }
    }
}
