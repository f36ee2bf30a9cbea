//! Tests for `RequestList`: ordering, dedup, lease validation, and
//! resumable persistence.

use crate::config::RequestListConfig;
use crate::kv::{InMemoryKeyValueStore, KeyValueStore};
use crate::request_list::RequestList;
use shared::{CrawlerError, Request, RequestSource};
use std::sync::Arc;

fn config(keep_duplicate_urls: bool) -> RequestListConfig {
    RequestListConfig { keep_duplicate_urls }
}

fn seeds(urls: &[&str]) -> Vec<Request> {
    urls.iter().map(|u| Request::new(*u).unwrap()).collect()
}

#[tokio::test]
async fn fetches_seeds_in_order() {
    let list = RequestList::new(seeds(&["http://e/a", "http://e/b", "http://e/c"]), config(false), None)
        .await
        .unwrap();

    let first = list.fetch_next().await.unwrap().unwrap();
    let second = list.fetch_next().await.unwrap().unwrap();
    let third = list.fetch_next().await.unwrap().unwrap();
    assert_eq!([first.url, second.url, third.url], ["http://e/a", "http://e/b", "http://e/c"]);
    assert!(list.fetch_next().await.unwrap().is_none());
}

#[tokio::test]
async fn dedupes_seeds_by_unique_key_unless_keeping_duplicates() {
    let deduped = RequestList::new(seeds(&["http://e/a", "http://e/a", "http://e/b"]), config(false), None)
        .await
        .unwrap();
    let mut seen = Vec::new();
    while let Some(r) = deduped.fetch_next().await.unwrap() {
        seen.push(r.url);
    }
    assert_eq!(seen, vec!["http://e/a", "http://e/b"]);

    let kept = RequestList::new(seeds(&["http://e/a", "http://e/a"]), config(true), None)
        .await
        .unwrap();
    let mut seen = Vec::new();
    while let Some(r) = kept.fetch_next().await.unwrap() {
        seen.push(r.url);
    }
    assert_eq!(seen, vec!["http://e/a", "http://e/a"]);
}

#[tokio::test]
async fn reclaimed_entries_are_served_before_fresh_seeds() {
    let list = RequestList::new(seeds(&["http://e/a", "http://e/b", "http://e/c"]), config(false), None)
        .await
        .unwrap();

    let a = list.fetch_next().await.unwrap().unwrap();
    list.reclaim(&a, false).await.unwrap();

    let next = list.fetch_next().await.unwrap().unwrap();
    assert_eq!(next.url, "http://e/a");
}

#[tokio::test]
async fn forefront_reclaim_jumps_ahead_of_other_reclaimed_entries() {
    let list = RequestList::new(seeds(&["http://e/a", "http://e/b", "http://e/c"]), config(false), None)
        .await
        .unwrap();

    let a = list.fetch_next().await.unwrap().unwrap();
    list.reclaim(&a, false).await.unwrap();
    let b = list.fetch_next().await.unwrap().unwrap();
    list.reclaim(&b, true).await.unwrap();

    let next = list.fetch_next().await.unwrap().unwrap();
    assert_eq!(next.url, "http://e/b");
}

#[tokio::test]
async fn mark_handled_rejects_without_a_lease() {
    let list = RequestList::new(seeds(&["http://e/a"]), config(false), None).await.unwrap();
    let request = Request::new("http://e/a").unwrap();
    let err = list.mark_handled(&request).await.unwrap_err();
    assert!(matches!(err, CrawlerError::Validation(_)));
}

#[tokio::test]
async fn reclaim_rejects_without_a_lease() {
    let list = RequestList::new(seeds(&["http://e/a"]), config(false), None).await.unwrap();
    let request = Request::new("http://e/a").unwrap();
    let err = list.reclaim(&request, false).await.unwrap_err();
    assert!(matches!(err, CrawlerError::Validation(_)));
}

#[tokio::test]
async fn add_is_unsupported() {
    let list = RequestList::new(seeds(&["http://e/a"]), config(false), None).await.unwrap();
    let err = RequestSource::add(&list, Request::new("http://e/b").unwrap(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, CrawlerError::Validation(_)));
}

#[tokio::test]
async fn reclaim_preserves_retry_bookkeeping_across_fetches() {
    let list = RequestList::new(seeds(&["http://e/a"]), config(false), None).await.unwrap();

    let mut leased = list.fetch_next().await.unwrap().unwrap();
    leased.record_retry("boom");
    list.reclaim(&leased, false).await.unwrap();

    let refetched = list.fetch_next().await.unwrap().unwrap();
    assert_eq!(refetched.retry_count, 1);
    assert_eq!(refetched.error_messages, vec!["boom"]);
}

#[tokio::test]
async fn is_finished_and_has_pending_work_track_lease_and_backlog_state() {
    let list = RequestList::new(seeds(&["http://e/a"]), config(false), None).await.unwrap();

    assert!(!list.is_finished().await.unwrap());
    assert!(list.has_pending_work().await.unwrap());

    let leased = list.fetch_next().await.unwrap().unwrap();
    assert!(!list.is_finished().await.unwrap());
    assert!(!list.has_pending_work().await.unwrap());

    list.mark_handled(&leased).await.unwrap();
    assert!(list.is_finished().await.unwrap());
    assert!(!list.has_pending_work().await.unwrap());
}

#[tokio::test]
async fn persists_snapshot_after_every_mutation() {
    let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
    let list = RequestList::new(
        seeds(&["http://e/a", "http://e/b"]),
        config(false),
        Some(("progress".into(), store.clone())),
    )
    .await
    .unwrap();

    list.fetch_next().await.unwrap();
    assert!(store.get("progress").await.unwrap().is_some());
}

#[tokio::test]
async fn resumes_next_index_and_reclaimed_entries_from_a_snapshot() {
    let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());

    let first_run = RequestList::new(
        seeds(&["http://e/a", "http://e/b", "http://e/c"]),
        config(false),
        Some(("progress".into(), store.clone())),
    )
    .await
    .unwrap();
    first_run.fetch_next().await.unwrap(); // leases a, never resolved this run
    let b = first_run.fetch_next().await.unwrap().unwrap(); // leases b
    // reclaim b explicitly so it is recorded as genuinely reclaimed, not
    // just abandoned in-progress like a.
    first_run.reclaim(&b, false).await.unwrap();

    let resumed = RequestList::new(
        seeds(&["http://e/a", "http://e/b", "http://e/c"]),
        config(false),
        Some(("progress".into(), store.clone())),
    )
    .await
    .unwrap();

    // "a" was abandoned in-progress by the crashed run and must resurface
    // first; "b" was genuinely reclaimed and follows it; "c" was never
    // reached so next_index correctly resumes before it.
    let first = resumed.fetch_next().await.unwrap().unwrap();
    let second = resumed.fetch_next().await.unwrap().unwrap();
    let third = resumed.fetch_next().await.unwrap().unwrap();
    assert_eq!([first.url, second.url, third.url], ["http://e/a", "http://e/b", "http://e/c"]);
}
