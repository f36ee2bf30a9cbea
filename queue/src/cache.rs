//! The unique-key → id cache, expressed as an explicit registry object
//! instead of a process-wide singleton: callers construct one
//! `CacheRegistry` and pass it into every `RequestQueue::new` that should
//! share state, which keeps tests isolated and lets independent crawlers
//! coexist in one process.

use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// What the cache remembers about a `unique_key`: its assigned id and the
/// last known `was_already_handled` flag, so a repeated `add` can
/// short-circuit without asking the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
    pub id: String,
    pub was_already_handled: bool,
}

/// A handle to one queue's unique-key cache. Cheap to clone; all clones
/// share the same underlying LRU.
#[derive(Clone)]
pub struct UniqueKeyCache {
    inner: Arc<Mutex<LruCache<String, CachedEntry>>>,
}

impl UniqueKeyCache {
    fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub async fn get(&self, unique_key: &str) -> Option<CachedEntry> {
        self.inner.lock().await.get(unique_key).cloned()
    }

    pub async fn insert(&self, unique_key: String, entry: CachedEntry) {
        self.inner.lock().await.put(unique_key, entry);
    }
}

/// Holds one [`UniqueKeyCache`] per queue id, constructed once and shared
/// by every `RequestQueue` instance for that id.
pub struct CacheRegistry {
    caches: Mutex<HashMap<String, UniqueKeyCache>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self {
            caches: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cache for `queue_id`, creating it with `capacity` on
    /// first use. `capacity` is ignored on subsequent calls for the same
    /// id — the first caller to register a queue id wins.
    pub async fn get_or_create(&self, queue_id: &str, capacity: usize) -> UniqueKeyCache {
        let mut caches = self.caches.lock().await;
        caches
            .entry(queue_id.to_string())
            .or_insert_with(|| UniqueKeyCache::new(capacity))
            .clone()
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}
