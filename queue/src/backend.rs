//! The storage interface a `RequestQueue` consumes.
//!
//! `LocalQueueBackend` is the only implementation shipped here, a local
//! single-process emulation; a remote backend implements the same trait
//! and plugs in without touching `RequestQueue`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{CrawlerError, Request};

/// One entry of a queue head listing.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueHeadItem {
    pub id: String,
    pub unique_key: String,
}

/// Result of `list_head`: the ordered items plus the consistency signals
/// `RequestQueue::is_finished` needs.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueHeadResult {
    pub items: Vec<QueueHeadItem>,
    pub queue_modified_at: DateTime<Utc>,
    pub had_multiple_clients: bool,
}

/// Aggregate counters exposed by `getInfo`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueInfo {
    pub total_request_count: u64,
    pub handled_request_count: u64,
    pub pending_request_count: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
}

/// The external storage service a `RequestQueue` is built on. Must be
/// idempotent on `add` by `unique_key` and must return `queue_modified_at`
/// monotonically non-decreasing per queue.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Inserts a new request. Implementations dedupe by `request.unique_key`
    /// and return the existing record (`was_already_present = true`) rather
    /// than creating a second one.
    async fn add(&self, request: Request, forefront: bool) -> Result<shared::QueueOperationInfo, CrawlerError>;

    /// Updates an existing record (repositioning via `forefront`, or
    /// recording `handled_at`). The request's `id` must already be set.
    async fn update(&self, request: Request, forefront: bool) -> Result<shared::QueueOperationInfo, CrawlerError>;

    async fn get(&self, id: &str) -> Result<Option<Request>, CrawlerError>;

    async fn list_head(&self, limit: usize) -> Result<QueueHeadResult, CrawlerError>;

    async fn get_info(&self) -> Result<QueueInfo, CrawlerError>;

    async fn delete(&self) -> Result<(), CrawlerError>;
}
