//! The request lifecycle coordinator: translates a source of requests into
//! the pool's `TaskController` protocol, applying timeouts, retries, and
//! terminal failure handling.

use crate::pool::{AutoscaledPool, PoolConfig};
use crate::sampler::ResourceMonitor;
use crate::task_controller::TaskController;
use async_trait::async_trait;
use shared::{CrawlerError, Request, RequestSource};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// The user-supplied per-page handler.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: &Request) -> Result<(), CrawlerError>;
}

/// The terminal hook invoked once a request exhausts its retries (or is
/// marked `no_retry`). After this runs the request is marked handled and
/// never re-enters its source.
#[async_trait]
pub trait FailedRequestHandler: Send + Sync {
    async fn handle_failed(&self, request: &Request, error: &CrawlerError);
}

/// Tunables for [`Crawler`].
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub max_request_retries: u32,
    pub max_requests_per_crawl: Option<u64>,
    pub handle_page_timeout: Duration,
    /// Whether a reclaimed (retried) request is placed at the forefront of
    /// its source so it is retried soon rather than queued behind fresh work.
    pub retry_forefront: bool,
}

type BoxedTask = Pin<Box<dyn Future<Output = Result<(), CrawlerError>> + Send>>;

/// Composes a request source (list and/or queue) with the pool, implementing
/// fetch/handle/retry/complete. Cheap to clone: all state is `Arc`-backed.
#[derive(Clone)]
pub struct Crawler<H, F>
where
    H: RequestHandler + 'static,
    F: FailedRequestHandler + 'static,
{
    list: Option<Arc<dyn RequestSource>>,
    /// The source a leased request is actually owned by: the queue when
    /// both a list and a queue are configured (the list's requests are
    /// migrated into the queue before handling), otherwise whichever
    /// single source exists.
    primary: Arc<dyn RequestSource>,
    handler: Arc<H>,
    failed_handler: Arc<F>,
    config: CrawlerConfig,
    handled_count: Arc<AtomicU64>,
    stopped: Arc<AtomicBool>,
    /// Lazily built by `run()`, which owns the pool rather than handing one
    /// back to the caller: keeps `AutoscaledPool`'s only reference to its
    /// controller pointed inward (via `Arc<Self>`), never back out to
    /// whatever built the crawler.
    pool: Arc<OnceCell<AutoscaledPool<Crawler<H, F>>>>,
}

impl<H, F> Crawler<H, F>
where
    H: RequestHandler + 'static,
    F: FailedRequestHandler + 'static,
{
    pub fn new(
        list: Option<Arc<dyn RequestSource>>,
        queue: Option<Arc<dyn RequestSource>>,
        handler: Arc<H>,
        failed_handler: Arc<F>,
        config: CrawlerConfig,
    ) -> Result<Self, CrawlerError> {
        let primary = queue
            .clone()
            .or_else(|| list.clone())
            .ok_or_else(|| CrawlerError::Validation("crawler needs a list or a queue".into()))?;

        Ok(Self {
            list,
            primary,
            handler,
            failed_handler,
            config,
            handled_count: Arc::new(AtomicU64::new(0)),
            stopped: Arc::new(AtomicBool::new(false)),
            pool: Arc::new(OnceCell::new()),
        })
    }

    /// Read-only count of requests that reached a terminal state, whether
    /// via success or via `handle_failed`.
    pub fn handled_request_count(&self) -> u64 {
        self.handled_count.load(Ordering::SeqCst)
    }

    /// Builds an `AutoscaledPool` over this crawler and runs it to
    /// completion. Must be called at most once per crawler: the pool is
    /// built lazily on first call and reused by any later call instead of
    /// being rebuilt, so a second `run()` with different arguments silently
    /// gets the first call's pool.
    pub async fn run(
        self: &Arc<Self>,
        resource_monitor: Arc<dyn ResourceMonitor>,
        pool_config: PoolConfig,
    ) -> Result<(), CrawlerError> {
        let pool = self
            .pool
            .get_or_init(|| async { AutoscaledPool::new(self.clone(), resource_monitor, pool_config) })
            .await;
        pool.run().await
    }

    /// Stop accepting new work. In-flight handler calls are unaffected. If
    /// `run()` has already built the pool, this also aborts it so `run()`
    /// returns promptly instead of waiting for the source to drain.
    pub fn stop(&self) {
        info!("crawler stop requested");
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(pool) = self.pool.get() {
            pool.abort();
        }
    }

    fn reached_crawl_limit(&self) -> bool {
        match self.config.max_requests_per_crawl {
            Some(limit) => self.handled_count.load(Ordering::SeqCst) >= limit,
            None => false,
        }
    }

    fn list_is_distinct_from_primary(&self) -> Option<&Arc<dyn RequestSource>> {
        self.list
            .as_ref()
            .filter(|list| !Arc::ptr_eq(list, &self.primary))
    }

    /// Prefer the list, migrating its next request into the queue
    /// (forefront) when both are configured; otherwise pull directly from
    /// whichever single source is configured.
    async fn fetch_one(&self) -> Result<Option<Request>, CrawlerError> {
        if let Some(list) = self.list_is_distinct_from_primary() {
            if let Some(seed) = list.fetch_next().await? {
                return match self.primary.add(seed.clone(), true).await {
                    Ok(_info) => {
                        let queued = self.primary.fetch_next().await?;
                        list.mark_handled(&seed).await?;
                        Ok(queued)
                    }
                    Err(err) => {
                        if let Err(reclaim_err) = list.reclaim(&seed, true).await {
                            warn!(error = %reclaim_err, "failed to reclaim list seed after failed enqueue");
                        }
                        Err(err)
                    }
                };
            }
        }
        self.primary.fetch_next().await
    }

    async fn handle_failure(&self, request: &mut Request, error: CrawlerError) -> Result<(), CrawlerError> {
        let terminal = request.no_retry || request.retry_count >= self.config.max_request_retries;
        if terminal {
            debug!(
                url = %request.url,
                retry_count = request.retry_count,
                "request exhausted retries, marking handled and invoking failure hook"
            );
            request.mark_handled();
            self.primary.mark_handled(request).await?;
            self.handled_count.fetch_add(1, Ordering::SeqCst);
            self.failed_handler.handle_failed(request, &error).await;
            return Ok(());
        }

        // Build the retried candidate up front and reclaim *that*, so the
        // source's persisted copy actually carries the bumped retry_count
        // and appended error message. We only commit it locally once the
        // reclaim call itself has succeeded, so a reclaim that fails
        // never burns a retry the source never actually recorded.
        let mut candidate = request.clone();
        candidate.record_retry(error.to_string());

        match self.primary.reclaim(&candidate, self.config.retry_forefront).await {
            Ok(()) => {
                debug!(url = %candidate.url, retry_count = candidate.retry_count, "reclaimed for retry");
                *request = candidate;
                Ok(())
            }
            Err(reclaim_err) => {
                // A reclaim that itself fails must not burn a retry; leave
                // retry_count untouched and let the next tick attempt the
                // reclaim again.
                warn!(error = %reclaim_err, "reclaim failed, retry_count left unchanged");
                Ok(())
            }
        }
    }

    async fn run_one(self, mut request: Request) -> Result<(), CrawlerError> {
        let outcome = tokio::time::timeout(
            self.config.handle_page_timeout,
            self.handler.handle(&request),
        )
        .await;

        match outcome {
            Ok(Ok(())) => {
                request.mark_handled();
                self.primary.mark_handled(&request).await?;
                self.handled_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Ok(Err(err)) => self.handle_failure(&mut request, err).await,
            Err(_) => {
                self.handle_failure(&mut request, CrawlerError::Timeout(self.config.handle_page_timeout))
                    .await
            }
        }
    }
}

#[async_trait]
impl<H, F> TaskController for Crawler<H, F>
where
    H: RequestHandler + 'static,
    F: FailedRequestHandler + 'static,
{
    type Task = BoxedTask;

    async fn produce(&self) -> Option<Self::Task> {
        match self.fetch_one().await {
            Ok(Some(request)) => {
                let this = self.clone();
                Some(Box::pin(async move { this.run_one(request).await }))
            }
            Ok(None) => None,
            Err(err) if err.is_retryable() => {
                warn!(error = %err, "transient error fetching next request, retrying next tick");
                None
            }
            Err(err) => {
                // Validation/FatalBackend: surface through the pool's normal
                // task-error channel so run() rejects with it.
                Some(Box::pin(async move { Err(err) }))
            }
        }
    }

    async fn is_task_ready(&self) -> bool {
        if self.stopped.load(Ordering::SeqCst) || self.reached_crawl_limit() {
            return false;
        }
        if let Some(list) = self.list_is_distinct_from_primary() {
            if list.has_pending_work().await.unwrap_or(false) {
                return true;
            }
        }
        self.primary.has_pending_work().await.unwrap_or(false)
    }

    async fn is_finished(&self) -> bool {
        if self.stopped.load(Ordering::SeqCst) || self.reached_crawl_limit() {
            return true;
        }
        let primary_finished = self.primary.is_finished().await.unwrap_or(false);
        if !primary_finished {
            return false;
        }
        match self.list_is_distinct_from_primary() {
            Some(list) => list.is_finished().await.unwrap_or(false),
            None => true,
        }
    }
}
