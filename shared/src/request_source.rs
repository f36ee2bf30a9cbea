//! The seam between the crawler and whatever is feeding it requests.
//!
//! A `RequestSource` is anything the crawler can pull a [`Request`] from and
//! later report back to: a [`RequestQueue`](https://docs.rs) in the `queue`
//! crate, a `RequestList`, or a test double. The engine crate never depends
//! on a concrete queue type, only on this trait, so swapping the storage
//! backend never touches `engine`.

use crate::queue_record::QueueOperationInfo;
use crate::request::Request;
use crate::Result;
use async_trait::async_trait;

/// A source of work the crawler can lease requests from and resolve.
///
/// Implementors own whatever in-progress bookkeeping is needed to guarantee
/// a request is leased to at most one caller at a time; the crawler only
/// ever sees the operations below.
#[async_trait]
pub trait RequestSource: Send + Sync {
    /// Add a request to the source, deduplicated by `unique_key`.
    ///
    /// `RequestList`-backed sources don't support runtime insertion — they
    /// are seeded once from a fixed configuration — and reject this with
    /// `CrawlerError::Validation`; only queue-backed sources implement it
    /// for real. The crawler only calls this on the queue side of a
    /// list+queue pairing, migrating a request out of the list before
    /// working it from the queue.
    async fn add(&self, request: Request, forefront: bool) -> Result<QueueOperationInfo>;

    /// Lease the next available request, if any is ready right now.
    async fn fetch_next(&self) -> Result<Option<Request>>;

    /// Resolve a leased request as terminally handled.
    async fn mark_handled(&self, request: &Request) -> Result<()>;

    /// Return a leased request to the source for another attempt.
    async fn reclaim(&self, request: &Request, forefront: bool) -> Result<()>;

    /// True once this source has no more work and no lease is outstanding.
    async fn is_finished(&self) -> Result<bool>;

    /// True if the source appears to have work ready without leasing it.
    ///
    /// Conservative by contract: implementations should return `false` when
    /// uncertain rather than promise work that may not materialize.
    async fn has_pending_work(&self) -> Result<bool>;
}
