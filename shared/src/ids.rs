//! Deterministic id derivation for the local single-process queue backend
//!
//! When the backend is a local single-process emulation, `id` is a
//! deterministic hash of `unique_key` (same input → same id). Remote
//! backends assign ids server-side and must not go through this path;
//! this module exists for the reference `LocalQueueBackend` only.

use blake3::Hasher;

/// Number of hex characters kept from the BLAKE3 digest. Nothing in this
/// crate depends on a specific width, only on stability and 1:1-ness for
/// a given input, so a short truncation is enough.
const ID_HEX_LEN: usize = 24;

/// Derive a stable request id from a `unique_key`. Same input always
/// produces the same id, which is exactly what lets `RequestQueue::add`
/// short-circuit duplicate `unique_key`s without asking the backend.
pub fn derive_request_id(unique_key: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(unique_key.as_bytes());
    let hex = hasher.finalize().to_hex().to_string();
    hex[..ID_HEX_LEN].to_string()
}
