//! `RequestQueue`: a deduplicated, eventually-consistent work queue built
//! on a pluggable [`QueueBackend`].
//!
//! Everything this module owns is *per-client* (`pending_head`,
//! `in_progress`, `recently_reclaimed`): the unique-key → id mapping is the
//! only state shared across `RequestQueue` instances for the same queue
//! id, via [`CacheRegistry`].

use crate::backend::QueueBackend;
use crate::cache::{CachedEntry, CacheRegistry, UniqueKeyCache};
use crate::config::QueueConfig;
use async_trait::async_trait;
use chrono::Utc;
use shared::queue_record::QueueOperationInfo;
use shared::{CrawlerError, Request, RequestSource, Result};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// The three pieces of per-client bookkeeping, grouped under one lock
/// since every mutation touches at least two of them together (e.g. a
/// reclaim moves an id from `in_progress` into `recently_reclaimed`).
#[derive(Default)]
struct QueueState {
    /// FIFO cache of the next ids to fetch. Backed by a `VecDeque` rather
    /// than a literal order-number → id map: the backend already returns
    /// `list_head` sorted by order number, so all this needs to preserve
    /// is that order, not the numeric keys themselves.
    pending_head: VecDeque<String>,
    /// Ids currently leased to this client.
    in_progress: HashSet<String>,
    /// Ids reclaimed (or fetched into a consistency hole) within the last
    /// `storage_consistency_delay`; must not re-enter `pending_head`
    /// until the window elapses.
    recently_reclaimed: HashSet<String>,
}

impl QueueState {
    fn blocks_requeue(&self, id: &str) -> bool {
        self.in_progress.contains(id) || self.recently_reclaimed.contains(id)
    }
}

/// A deduplicated, eventually-consistent work queue. Implements
/// [`RequestSource`] so it plugs directly into `engine::Crawler`.
pub struct RequestQueue {
    queue_id: String,
    backend: Arc<dyn QueueBackend>,
    cache: UniqueKeyCache,
    config: QueueConfig,
    state: Arc<Mutex<QueueState>>,
    assumed_total_count: AtomicU64,
    assumed_handled_count: AtomicU64,
}

impl RequestQueue {
    /// Opens a queue backed by `backend`, sharing its unique-key cache
    /// with any other `RequestQueue` for the same `queue_id` constructed
    /// from `registry`.
    pub async fn new(
        queue_id: impl Into<String>,
        backend: Arc<dyn QueueBackend>,
        registry: &CacheRegistry,
        config: QueueConfig,
    ) -> Self {
        let queue_id = queue_id.into();
        let cache = registry.get_or_create(&queue_id, config.unique_key_cache_capacity).await;
        Self {
            queue_id,
            backend,
            cache,
            config,
            state: Arc::new(Mutex::new(QueueState::default())),
            assumed_total_count: AtomicU64::new(0),
            assumed_handled_count: AtomicU64::new(0),
        }
    }

    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    /// Client-local estimate of total requests ever seen by this client,
    /// used only to short-circuit `is_finished`; never a substitute for
    /// the backend's `get_info().total_request_count`.
    pub fn assumed_total_count(&self) -> u64 {
        self.assumed_total_count.load(Ordering::SeqCst)
    }

    pub fn assumed_handled_count(&self) -> u64 {
        self.assumed_handled_count.load(Ordering::SeqCst)
    }

    /// Adds a request, deduplicated by `unique_key`. A cache hit
    /// short-circuits without calling the backend at all.
    pub async fn add_request(&self, request: Request, forefront: bool) -> Result<QueueOperationInfo> {
        if request.id.is_some() {
            return Err(CrawlerError::Validation(
                "add rejects a caller-assigned id: ids are assigned by the queue".into(),
            ));
        }

        if let Some(cached) = self.cache.get(&request.unique_key).await {
            debug!(unique_key = %request.unique_key, id = %cached.id, "add short-circuited by cache");
            let mut echoed = request;
            echoed.id = Some(cached.id.clone());
            return Ok(QueueOperationInfo {
                request_id: cached.id,
                was_already_present: true,
                was_already_handled: cached.was_already_handled,
                request: echoed,
            });
        }

        let info = self.backend.add(request, forefront).await?;
        self.cache
            .insert(
                info.request.unique_key.clone(),
                CachedEntry {
                    id: info.request_id.clone(),
                    was_already_handled: info.was_already_handled,
                },
            )
            .await;
        if !info.was_already_present {
            self.assumed_total_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(info)
    }

    async fn query_queue_head(&self, limit: usize) -> Result<crate::backend::QueueHeadResult> {
        let result = self.backend.list_head(limit.max(self.config.query_head_min_length)).await?;
        for item in &result.items {
            self.cache
                .insert(
                    item.unique_key.clone(),
                    CachedEntry {
                        id: item.id.clone(),
                        was_already_handled: false,
                    },
                )
                .await;
        }
        Ok(result)
    }

    /// Re-populates `pending_head` from the backend, skipping anything
    /// currently leased or inside a consistency window. Used by both
    /// `fetch_next_request` (step 1) and `has_pending_work`/`is_empty`.
    async fn refill_pending_head(&self) -> Result<()> {
        let head = self.query_queue_head(self.config.query_head_min_length).await?;
        let mut state = self.state.lock().await;
        for item in head.items {
            if state.blocks_requeue(&item.id) {
                continue;
            }
            if !state.pending_head.contains(&item.id) {
                state.pending_head.push_back(item.id);
            }
        }
        Ok(())
    }

    /// Leases the next available request, following a four-step
    /// algorithm: refill the pending head if empty, pop the lowest-ordered
    /// id, mark it in-progress, then resolve it against the backend.
    pub async fn fetch_next_request(&self) -> Result<Option<Request>> {
        let empty = self.state.lock().await.pending_head.is_empty();
        if empty {
            self.refill_pending_head().await?;
        }

        let id = match self.state.lock().await.pending_head.pop_front() {
            Some(id) => id,
            None => return Ok(None),
        };

        self.state.lock().await.in_progress.insert(id.clone());

        match self.backend.get(&id).await? {
            Some(request) => Ok(Some(request)),
            None => {
                warn!(id = %id, "fetch_next_request: head returned an id the backend can't read yet");
                self.schedule_release(id, None);
                Ok(None)
            }
        }
    }

    /// Terminal resolution of a lease.
    pub async fn mark_request_handled(&self, request: &Request) -> Result<()> {
        let id = request
            .id
            .clone()
            .ok_or_else(|| CrawlerError::Validation("mark_request_handled requires an assigned request id".into()))?;

        {
            let state = self.state.lock().await;
            if !state.in_progress.contains(&id) {
                return Err(CrawlerError::Validation(format!(
                    "mark_request_handled called for id '{id}' with no active lease for this client"
                )));
            }
        }

        let mut handled = request.clone();
        handled.mark_handled();
        self.backend.update(handled, false).await?;

        self.state.lock().await.in_progress.remove(&id);
        self.assumed_handled_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Returns a leased request to the queue for another attempt,
    /// absorbing read-your-write lag behind `storage_consistency_delay`.
    pub async fn reclaim_request(&self, request: &Request, forefront: bool) -> Result<()> {
        let id = request
            .id
            .clone()
            .ok_or_else(|| CrawlerError::Validation("reclaim_request requires an assigned request id".into()))?;

        {
            let state = self.state.lock().await;
            if !state.in_progress.contains(&id) {
                return Err(CrawlerError::Validation(format!(
                    "reclaim_request called for id '{id}' with no active lease for this client"
                )));
            }
        }

        self.backend.update(request.clone(), forefront).await?;

        {
            let mut state = self.state.lock().await;
            state.in_progress.remove(&id);
            state.recently_reclaimed.insert(id.clone());
        }
        self.schedule_release(id, Some(forefront));
        Ok(())
    }

    /// Releases `id` from whichever window it is inside
    /// (`recently_reclaimed` when `forefront` is `Some`, the
    /// consistency-hole `in_progress` entry when `None`) after
    /// `storage_consistency_delay`, then makes it eligible for
    /// `pending_head` again.
    fn schedule_release(&self, id: String, forefront: Option<bool>) {
        let state = self.state.clone();
        let delay = self.config.storage_consistency_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = state.lock().await;
            state.recently_reclaimed.remove(&id);
            state.in_progress.remove(&id);
            if state.pending_head.contains(&id) {
                return;
            }
            match forefront {
                Some(true) => state.pending_head.push_front(id),
                Some(false) => state.pending_head.push_back(id),
                // A consistency-hole release just clears the block; the
                // next `refill_pending_head` call will re-discover the id
                // from the backend in its correct position.
                None => {}
            }
        });
    }

    /// True iff `pending_head` is empty AND a fresh query of the queue
    /// head returns nothing.
    pub async fn is_empty(&self) -> Result<bool> {
        if !self.state.lock().await.pending_head.is_empty() {
            return Ok(false);
        }
        self.refill_pending_head().await?;
        Ok(self.state.lock().await.pending_head.is_empty())
    }

    /// True once there is no outstanding work and, for a head that may
    /// be observed by other clients, only once the head has been
    /// consistent for long enough to trust an empty read.
    /// `recently_reclaimed` is folded into the "outstanding work" check
    /// alongside `in_progress`/`pending_head`: a reclaim inside its
    /// consistency window is exactly the kind of "peer may still be
    /// enqueueing" uncertainty the multi-client check exists to guard
    /// against.
    pub async fn is_finished(&self) -> Result<bool> {
        {
            let state = self.state.lock().await;
            if !state.in_progress.is_empty()
                || !state.pending_head.is_empty()
                || !state.recently_reclaimed.is_empty()
            {
                return Ok(false);
            }
        }

        for attempt in 0..self.config.is_finished_consistency_retries.max(1) {
            let head = self.query_queue_head(self.config.query_head_min_length).await?;
            if !head.items.is_empty() {
                return Ok(false);
            }
            if !head.had_multiple_clients {
                return Ok(true);
            }

            let age = Utc::now().signed_duration_since(head.queue_modified_at);
            let threshold = chrono::Duration::from_std(self.config.api_processed_requests_delay)
                .unwrap_or(chrono::Duration::zero());
            if age >= threshold {
                return Ok(true);
            }

            if attempt + 1 >= self.config.is_finished_consistency_retries {
                break;
            }
            debug!(
                attempt,
                "is_finished: multi-client head not yet consistent, retrying after storage_consistency_delay"
            );
            tokio::time::sleep(self.config.storage_consistency_delay).await;
        }

        Ok(false)
    }

    pub async fn get_info(&self) -> Result<crate::backend::QueueInfo> {
        self.backend.get_info().await
    }

    pub async fn drop_queue(&self) -> Result<()> {
        self.backend.delete().await
    }
}

#[async_trait]
impl RequestSource for RequestQueue {
    async fn add(&self, request: Request, forefront: bool) -> Result<QueueOperationInfo> {
        self.add_request(request, forefront).await
    }

    async fn fetch_next(&self) -> Result<Option<Request>> {
        self.fetch_next_request().await
    }

    async fn mark_handled(&self, request: &Request) -> Result<()> {
        self.mark_request_handled(request).await
    }

    async fn reclaim(&self, request: &Request, forefront: bool) -> Result<()> {
        self.reclaim_request(request, forefront).await
    }

    async fn is_finished(&self) -> Result<bool> {
        RequestQueue::is_finished(self).await
    }

    async fn has_pending_work(&self) -> Result<bool> {
        if !self.state.lock().await.pending_head.is_empty() {
            return Ok(true);
        }
        self.refill_pending_head().await?;
        Ok(!self.state.lock().await.pending_head.is_empty())
    }
}
