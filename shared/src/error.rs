//! Typed errors shared by the engine and queue crates
//!
//! One enum covers every error kind a crawl can surface, not one per
//! crate, so a queue error can cross into the crawler's retry logic with
//! a plain `?` instead of a conversion shim.

use std::time::Duration;

/// `Validation` and `FatalBackend` always surface to `run()`; `Timeout`,
/// `TransientBackend` and `Handler` are retryable and get absorbed into a
/// request's `error_messages`; `Cancelled` marks a deliberate
/// `abort()`/`stop()`.
#[derive(Debug, thiserror::Error, Clone)]
pub enum CrawlerError {
    /// Misused API: caller set `request.id`, or called `reclaim`/
    /// `mark_handled` outside of an active lease.
    #[error("validation error: {0}")]
    Validation(String),

    /// The fetch phase or the handler phase exceeded its configured bound.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The queue backend call failed with a recoverable status; the
    /// caller is expected to retry with backoff.
    #[error("transient backend error: {0}")]
    TransientBackend(String),

    /// The queue backend call failed in a way that cannot be retried.
    /// Surfaces to the pool and fails `run()`.
    #[error("fatal backend error: {0}")]
    FatalBackend(String),

    /// The user-supplied handler returned an error. Retryable up to
    /// `max_request_retries`.
    #[error("handler error: {0}")]
    Handler(String),

    /// `abort()`/`stop()` was invoked.
    #[error("cancelled")]
    Cancelled,
}

impl CrawlerError {
    /// Validation and fatal-backend errors are not retryable; everything
    /// else drives the crawler's retry path.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            CrawlerError::Validation(_) | CrawlerError::FatalBackend(_) | CrawlerError::Cancelled
        )
    }
}
