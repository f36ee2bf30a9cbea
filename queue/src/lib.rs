//! The request queue and request list: a deduplicated, eventually-consistent
//! work queue and its finite, restartable sibling, plus the pluggable
//! storage trait and shared cache registry both depend on.
//!
//! Depends on `shared` only; never depended on by `engine`, which only
//! ever sees `shared::RequestSource`, the trait both [`request_queue::RequestQueue`]
//! and [`request_list::RequestList`] implement.

pub mod backend;
pub mod cache;
pub mod config;
pub mod kv;
pub mod local_backend;
pub mod request_list;
pub mod request_queue;

pub use backend::{QueueBackend, QueueHeadItem, QueueHeadResult, QueueInfo};
pub use cache::{CacheRegistry, CachedEntry, UniqueKeyCache};
pub use config::{QueueConfig, RequestListConfig};
pub use kv::{FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore};
pub use local_backend::LocalQueueBackend;
pub use request_list::RequestList;
pub use request_queue::RequestQueue;

#[cfg(test)]
mod tests;
