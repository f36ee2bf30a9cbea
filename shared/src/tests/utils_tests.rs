//! Tests for canonicalization and timestamp helpers

use crate::utils::canonicalize_url;

#[test]
fn canonicalize_strips_fragment() {
    let a = canonicalize_url("https://example.com/page#section").unwrap();
    let b = canonicalize_url("https://example.com/page").unwrap();
    assert_eq!(a, b);
}

#[test]
fn canonicalize_sorts_query_params() {
    let a = canonicalize_url("https://example.com/?b=2&a=1").unwrap();
    let b = canonicalize_url("https://example.com/?a=1&b=2").unwrap();
    assert_eq!(a, b);
}

#[test]
fn canonicalize_lowercases_scheme_and_host() {
    let url = canonicalize_url("HTTPS://Example.COM/path").unwrap();
    assert_eq!(url, "https://example.com/path");
}

#[test]
fn canonicalize_rejects_garbage() {
    assert!(canonicalize_url("definitely not a url").is_err());
}
