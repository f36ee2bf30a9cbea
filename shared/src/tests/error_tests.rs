//! Tests for the shared error kinds

use crate::error::CrawlerError;
use std::time::Duration;

#[test]
fn validation_and_fatal_backend_are_not_retryable() {
    assert!(!CrawlerError::Validation("bad".into()).is_retryable());
    assert!(!CrawlerError::FatalBackend("down".into()).is_retryable());
    assert!(!CrawlerError::Cancelled.is_retryable());
}

#[test]
fn timeout_transient_and_handler_are_retryable() {
    assert!(CrawlerError::Timeout(Duration::from_secs(1)).is_retryable());
    assert!(CrawlerError::TransientBackend("retry me".into()).is_retryable());
    assert!(CrawlerError::Handler("boom".into()).is_retryable());
}

#[test]
fn error_messages_are_human_readable() {
    let err = CrawlerError::Handler("parse failed".into());
    assert_eq!(err.to_string(), "handler error: parse failed");
}
