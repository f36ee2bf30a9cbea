//! Tests that `RequestSource` is object-safe and usable behind `Arc<dyn _>`

use crate::error::CrawlerError;
use crate::queue_record::QueueOperationInfo;
use crate::request::Request;
use crate::request_source::RequestSource;
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct CountingSource {
    remaining: AtomicUsize,
}

#[async_trait]
impl RequestSource for CountingSource {
    async fn add(&self, _request: Request, _forefront: bool) -> Result<QueueOperationInfo> {
        Err(CrawlerError::Validation("add not supported by this source".into()))
    }

    async fn fetch_next(&self) -> Result<Option<Request>> {
        if self.remaining.load(Ordering::SeqCst) == 0 {
            return Ok(None);
        }
        self.remaining.fetch_sub(1, Ordering::SeqCst);
        Ok(Some(Request::new("https://example.com").unwrap()))
    }

    async fn mark_handled(&self, _request: &Request) -> Result<()> {
        Ok(())
    }

    async fn reclaim(&self, _request: &Request, _forefront: bool) -> Result<()> {
        Err(CrawlerError::Validation("not leased".into()))
    }

    async fn is_finished(&self) -> Result<bool> {
        Ok(self.remaining.load(Ordering::SeqCst) == 0)
    }

    async fn has_pending_work(&self) -> Result<bool> {
        Ok(self.remaining.load(Ordering::SeqCst) > 0)
    }
}

#[tokio::test]
async fn dyn_request_source_drains_then_finishes() {
    let source: Arc<dyn RequestSource> = Arc::new(CountingSource {
        remaining: AtomicUsize::new(2),
    });

    assert!(source.has_pending_work().await.unwrap());
    assert!(source.fetch_next().await.unwrap().is_some());
    assert!(source.fetch_next().await.unwrap().is_some());
    assert!(source.fetch_next().await.unwrap().is_none());
    assert!(source.is_finished().await.unwrap());
}
