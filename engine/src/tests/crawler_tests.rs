//! End-to-end tests driving `Crawler` through the real `AutoscaledPool`,
//! covering the fetch/handle/retry/complete lifecycle scenarios.

use crate::crawler::{Crawler, CrawlerConfig, FailedRequestHandler, RequestHandler};
use crate::pool::PoolConfig;
use crate::sampler::{ResourceMonitor, ResourceSnapshot};
use async_trait::async_trait;
use shared::queue_record::QueueOperationInfo;
use shared::{CrawlerError, Request, RequestSource};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

struct StaticResourceMonitor;

#[async_trait]
impl ResourceMonitor for StaticResourceMonitor {
    async fn snapshot(&self) -> ResourceSnapshot {
        ResourceSnapshot {
            free_bytes: 800,
            total_bytes: 1000,
            main_process_bytes: 0,
        }
    }

    async fn is_cpu_overloaded(&self) -> bool {
        false
    }
}

fn sequential_pool_config() -> PoolConfig {
    PoolConfig {
        min_concurrency: 1,
        max_concurrency: 1,
        desired_concurrency_ratio: 0.95,
        scale_up_step_ratio: 0.05,
        scale_down_step_ratio: 0.05,
        maybe_run_interval: Duration::from_millis(10),
        autoscale_interval: Duration::from_secs(10),
        task_timeout: None,
        max_memory_bytes: None,
        min_free_memory_ratio: 0.2,
        ignore_main_process: false,
        logging_interval: None,
        scale_up_window: 5,
        scale_down_window: 5,
        scale_up_tick_interval: 10,
        scale_up_max_step: 10,
    }
}

/// A minimal in-memory `RequestSource` standing in for `queue::RequestQueue`
/// in these engine-level tests: dedup by `unique_key`, a pending deque that
/// honors `forefront`, and a lease set. The real dedup/consistency
/// semantics are exercised against the actual queue in the `queue` crate's
/// own test suite.
#[derive(Default)]
struct MockSource {
    pending: StdMutex<VecDeque<Request>>,
    leased: StdMutex<Vec<Request>>,
    known_keys: StdMutex<Vec<String>>,
    handled: StdMutex<Vec<Request>>,
    next_id: AtomicUsize,
}

impl MockSource {
    fn seed(&self, mut request: Request, forefront: bool) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        request.assign_id(id).unwrap();
        self.known_keys.lock().unwrap().push(request.unique_key.clone());
        let mut pending = self.pending.lock().unwrap();
        if forefront {
            pending.push_front(request);
        } else {
            pending.push_back(request);
        }
    }
}

#[async_trait]
impl RequestSource for MockSource {
    async fn add(&self, mut request: Request, forefront: bool) -> shared::Result<QueueOperationInfo> {
        let mut known = self.known_keys.lock().unwrap();
        if known.contains(&request.unique_key) {
            return Ok(QueueOperationInfo {
                request_id: request.id.clone().unwrap_or_default(),
                was_already_present: true,
                was_already_handled: false,
                request,
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        request.assign_id(id.clone()).ok();
        known.push(request.unique_key.clone());
        drop(known);

        let mut pending = self.pending.lock().unwrap();
        if forefront {
            pending.push_front(request.clone());
        } else {
            pending.push_back(request.clone());
        }

        Ok(QueueOperationInfo {
            request_id: id,
            was_already_present: false,
            was_already_handled: false,
            request,
        })
    }

    async fn fetch_next(&self) -> shared::Result<Option<Request>> {
        let next = self.pending.lock().unwrap().pop_front();
        if let Some(request) = &next {
            self.leased.lock().unwrap().push(request.clone());
        }
        Ok(next)
    }

    async fn mark_handled(&self, request: &Request) -> shared::Result<()> {
        self.leased.lock().unwrap().retain(|r| r.id != request.id);
        self.handled.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn reclaim(&self, request: &Request, forefront: bool) -> shared::Result<()> {
        self.leased.lock().unwrap().retain(|r| r.id != request.id);
        let mut pending = self.pending.lock().unwrap();
        if forefront {
            pending.push_front(request.clone());
        } else {
            pending.push_back(request.clone());
        }
        Ok(())
    }

    async fn is_finished(&self) -> shared::Result<bool> {
        Ok(self.pending.lock().unwrap().is_empty() && self.leased.lock().unwrap().is_empty())
    }

    async fn has_pending_work(&self) -> shared::Result<bool> {
        Ok(!self.pending.lock().unwrap().is_empty())
    }
}

struct AlwaysFailHandler;

#[async_trait]
impl RequestHandler for AlwaysFailHandler {
    async fn handle(&self, _request: &Request) -> Result<(), CrawlerError> {
        Err(CrawlerError::Handler("boom".into()))
    }
}

struct CountingFailedHandler {
    calls: Arc<StdMutex<Vec<String>>>,
}

#[async_trait]
impl FailedRequestHandler for CountingFailedHandler {
    async fn handle_failed(&self, request: &Request, _error: &CrawlerError) {
        self.calls.lock().unwrap().push(request.url.clone());
    }
}

struct AlwaysOkHandler;

#[async_trait]
impl RequestHandler for AlwaysOkHandler {
    async fn handle(&self, _request: &Request) -> Result<(), CrawlerError> {
        Ok(())
    }
}

struct NoopFailedHandler;

#[async_trait]
impl FailedRequestHandler for NoopFailedHandler {
    async fn handle_failed(&self, _request: &Request, _error: &CrawlerError) {}
}

#[tokio::test]
async fn retry_then_fail_exhausts_retries_and_invokes_failure_hook() {
    let source: Arc<dyn RequestSource> = Arc::new(MockSource::default());
    source.add(Request::new("https://example.com/x").unwrap(), false).await.unwrap();

    let failed_calls = Arc::new(StdMutex::new(Vec::new()));
    let config = CrawlerConfig {
        max_request_retries: 2,
        max_requests_per_crawl: None,
        handle_page_timeout: Duration::from_secs(5),
        retry_forefront: true,
    };

    let crawler = Arc::new(
        Crawler::new(
            None,
            Some(source.clone()),
            Arc::new(AlwaysFailHandler),
            Arc::new(CountingFailedHandler {
                calls: failed_calls.clone(),
            }),
            config,
        )
        .unwrap(),
    );

    let monitor: Arc<dyn ResourceMonitor> = Arc::new(StaticResourceMonitor);

    // A task error never surfaces here: failed requests are absorbed into
    // handle_failed, not propagated as a fatal pool error.
    crawler.run(monitor, sequential_pool_config()).await.unwrap();

    assert_eq!(failed_calls.lock().unwrap().as_slice(), ["https://example.com/x"]);
    assert_eq!(crawler.handled_request_count(), 1);
}

#[tokio::test]
async fn forefront_request_is_fetched_before_normal_request() {
    let source = Arc::new(MockSource::default());
    source.seed(Request::new("https://example.com/normal").unwrap(), false);
    source.seed(Request::new("https://example.com/forefront").unwrap(), true);

    let first = source.fetch_next().await.unwrap().unwrap();
    assert_eq!(first.url, "https://example.com/forefront");
    let second = source.fetch_next().await.unwrap().unwrap();
    assert_eq!(second.url, "https://example.com/normal");
}

#[tokio::test]
async fn successful_handler_marks_requests_handled_and_drains() {
    let source: Arc<dyn RequestSource> = Arc::new(MockSource::default());
    source.add(Request::new("https://example.com/a").unwrap(), false).await.unwrap();
    source.add(Request::new("https://example.com/b").unwrap(), false).await.unwrap();

    let config = CrawlerConfig {
        max_request_retries: 3,
        max_requests_per_crawl: None,
        handle_page_timeout: Duration::from_secs(5),
        retry_forefront: true,
    };
    let crawler = Arc::new(
        Crawler::new(
            None,
            Some(source),
            Arc::new(AlwaysOkHandler),
            Arc::new(NoopFailedHandler),
            config,
        )
        .unwrap(),
    );

    let monitor: Arc<dyn ResourceMonitor> = Arc::new(StaticResourceMonitor);
    crawler.run(monitor, sequential_pool_config()).await.unwrap();

    assert_eq!(crawler.handled_request_count(), 2);
}

#[tokio::test]
async fn max_requests_per_crawl_stops_early() {
    let source: Arc<dyn RequestSource> = Arc::new(MockSource::default());
    for url in ["https://example.com/a", "https://example.com/b", "https://example.com/c"] {
        source.add(Request::new(url).unwrap(), false).await.unwrap();
    }

    let config = CrawlerConfig {
        max_request_retries: 3,
        max_requests_per_crawl: Some(1),
        handle_page_timeout: Duration::from_secs(5),
        retry_forefront: true,
    };
    let crawler = Arc::new(
        Crawler::new(
            None,
            Some(source),
            Arc::new(AlwaysOkHandler),
            Arc::new(NoopFailedHandler),
            config,
        )
        .unwrap(),
    );

    let monitor: Arc<dyn ResourceMonitor> = Arc::new(StaticResourceMonitor);
    crawler.run(monitor, sequential_pool_config()).await.unwrap();

    assert_eq!(crawler.handled_request_count(), 1);
}
