//! Tests for `LocalQueueBackend`, the in-memory reference `QueueBackend`.

use crate::backend::QueueBackend;
use crate::local_backend::LocalQueueBackend;
use shared::Request;

#[tokio::test]
async fn add_is_idempotent_by_unique_key() {
    let backend = LocalQueueBackend::new();
    let first = backend.add(Request::new("https://example.com/a").unwrap(), false).await.unwrap();
    assert!(!first.was_already_present);

    let second = backend.add(Request::new("https://example.com/a").unwrap(), false).await.unwrap();
    assert!(second.was_already_present);
    assert_eq!(first.request_id, second.request_id);

    let info = backend.get_info().await.unwrap();
    assert_eq!(info.total_request_count, 1);
}

#[tokio::test]
async fn forefront_items_sort_ahead_of_normal_items() {
    let backend = LocalQueueBackend::new();
    backend.add(Request::new("https://example.com/normal").unwrap(), false).await.unwrap();
    backend.add(Request::new("https://example.com/forefront").unwrap(), true).await.unwrap();

    let head = backend.list_head(10).await.unwrap();
    assert_eq!(head.items[0].unique_key, "https://example.com/forefront");
    assert_eq!(head.items[1].unique_key, "https://example.com/normal");
}

#[tokio::test]
async fn update_can_reposition_to_forefront() {
    let backend = LocalQueueBackend::new();
    let a = backend.add(Request::new("https://example.com/a").unwrap(), false).await.unwrap();
    backend.add(Request::new("https://example.com/b").unwrap(), false).await.unwrap();

    backend.update(a.request.clone(), true).await.unwrap();

    let head = backend.list_head(10).await.unwrap();
    assert_eq!(head.items[0].unique_key, "https://example.com/a");
}

#[tokio::test]
async fn update_with_handled_at_removes_from_head() {
    let backend = LocalQueueBackend::new();
    let info = backend.add(Request::new("https://example.com/a").unwrap(), false).await.unwrap();

    let mut handled = info.request.clone();
    handled.mark_handled();
    backend.update(handled, false).await.unwrap();

    let head = backend.list_head(10).await.unwrap();
    assert!(head.items.is_empty());

    let stats = backend.get_info().await.unwrap();
    assert_eq!(stats.handled_request_count, 1);
    assert_eq!(stats.pending_request_count, 0);
}

#[tokio::test]
async fn get_returns_none_for_unknown_id() {
    let backend = LocalQueueBackend::new();
    assert!(backend.get("does-not-exist").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_clears_all_records() {
    let backend = LocalQueueBackend::new();
    backend.add(Request::new("https://example.com/a").unwrap(), false).await.unwrap();
    backend.delete().await.unwrap();

    let info = backend.get_info().await.unwrap();
    assert_eq!(info.total_request_count, 0);
}
