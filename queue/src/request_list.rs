//! `RequestList`: the finite, ordered, restartable seed source — the
//! simpler sibling of [`crate::request_queue::RequestQueue`].
//!
//! Unlike the queue, a `RequestList` never grows: it is seeded once from a
//! fixed configuration and only ever drains. It implements
//! [`RequestSource`] so it can stand in for a queue on its own, or feed a
//! queue per the `Crawler`'s list-then-queue composition.

use crate::config::RequestListConfig;
use crate::kv::KeyValueStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{CrawlerError, Request, RequestSource, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// The `{next_index, in_progress, reclaimed}` snapshot shape, persisted
/// through a [`KeyValueStore`]. `in_progress`/`reclaimed` are serialized
/// as ordered sequences rather than unordered sets: `reclaimed` order
/// encodes forefront priority, and preserving it across a resume is
/// worth more than an unordered set would buy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ListSnapshot {
    next_index: usize,
    in_progress: Vec<String>,
    reclaimed: Vec<String>,
}

struct ListState {
    next_index: usize,
    /// unique_key -> seed index, for requests currently leased.
    in_progress: HashMap<String, usize>,
    /// unique_keys awaiting another attempt, front = next to serve.
    reclaimed: VecDeque<String>,
}

/// Where a `RequestList` persists its progress, if anywhere.
struct Persistence {
    key: String,
    store: Arc<dyn KeyValueStore>,
}

/// A finite, ordered sequence of seed [`Request`]s.
pub struct RequestList {
    /// The fixed seed set, indexed by position. Individual entries are
    /// overwritten in place on `reclaim`/`mark_handled` so a later
    /// `fetch_next` for the same seed sees its accumulated retry
    /// bookkeeping (`retry_count`, `error_messages`), not the pristine
    /// seed value.
    requests: Mutex<Vec<Request>>,
    by_unique_key: HashMap<String, usize>,
    state: Mutex<ListState>,
    persistence: Option<Persistence>,
}

impl RequestList {
    /// Builds a list from `seeds`, deduplicating by `unique_key` unless
    /// `config.keep_duplicate_urls` is set.
    ///
    /// If `persistence` is given and the store already has a snapshot
    /// under `key`, resumes from it: `next_index` is restored, and any
    /// `unique_key` left `in_progress` by the crashed prior run — a lease
    /// nobody will ever resolve — is treated as reclaimed, so it is
    /// retried rather than lost.
    pub async fn new(
        seeds: Vec<Request>,
        config: RequestListConfig,
        persistence: Option<(String, Arc<dyn KeyValueStore>)>,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut requests = Vec::with_capacity(seeds.len());
        for seed in seeds {
            if !config.keep_duplicate_urls && !seen.insert(seed.unique_key.clone()) {
                debug!(unique_key = %seed.unique_key, "RequestList dropping duplicate seed");
                continue;
            }
            seen.insert(seed.unique_key.clone());
            requests.push(seed);
        }

        let by_unique_key: HashMap<String, usize> = requests
            .iter()
            .enumerate()
            .map(|(idx, r)| (r.unique_key.clone(), idx))
            .collect();

        let persistence = match persistence {
            Some((key, store)) => Some(Persistence { key, store }),
            None => None,
        };

        let mut state = ListState {
            next_index: 0,
            in_progress: HashMap::new(),
            reclaimed: VecDeque::new(),
        };

        if let Some(p) = &persistence {
            if let Some(bytes) = p.store.get(&p.key).await? {
                let snapshot: ListSnapshot = serde_json::from_slice(&bytes)
                    .map_err(|e| CrawlerError::Validation(format!("corrupt RequestList snapshot: {e}")))?;
                state.next_index = snapshot.next_index;
                for key in snapshot.reclaimed {
                    if by_unique_key.contains_key(&key) {
                        state.reclaimed.push_back(key);
                    }
                }
                // Leases from the crashed run have no owner anymore; treat
                // them as reclaimed, ahead of anything already waiting, so
                // the oldest unresolved work is retried first.
                for key in snapshot.in_progress.into_iter().rev() {
                    if by_unique_key.contains_key(&key) {
                        state.reclaimed.push_front(key);
                    }
                }
            }
        }

        let list = Self {
            requests: Mutex::new(requests),
            by_unique_key,
            state: Mutex::new(state),
            persistence,
        };
        list.persist().await?;
        Ok(list)
    }

    async fn persist(&self) -> Result<()> {
        let Some(p) = &self.persistence else {
            return Ok(());
        };
        let state = self.state.lock().await;
        let snapshot = ListSnapshot {
            next_index: state.next_index,
            in_progress: state.in_progress.keys().cloned().collect(),
            reclaimed: state.reclaimed.iter().cloned().collect(),
        };
        drop(state);
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| CrawlerError::Validation(format!("failed to serialize RequestList snapshot: {e}")))?;
        p.store.put(&p.key, bytes).await
    }

    /// Reclaimed entries are served before fresh ones, so a retried
    /// request doesn't wait behind the entire remaining seed list.
    pub async fn fetch_next(&self) -> Result<Option<Request>> {
        let idx = {
            let mut state = self.state.lock().await;
            if let Some(key) = state.reclaimed.pop_front() {
                let idx = *self
                    .by_unique_key
                    .get(&key)
                    .expect("reclaimed key must exist in the seed list");
                state.in_progress.insert(key, idx);
                idx
            } else if state.next_index < self.by_unique_key.len() {
                let idx = state.next_index;
                state.next_index += 1;
                let key = self.requests.lock().await[idx].unique_key.clone();
                state.in_progress.insert(key, idx);
                idx
            } else {
                return Ok(None);
            }
        };

        self.persist().await?;
        Ok(Some(self.requests.lock().await[idx].clone()))
    }

    /// Resolves a lease with no further action.
    pub async fn mark_handled(&self, request: &Request) -> Result<()> {
        let idx = self.leased_index(&request.unique_key).await?;
        self.requests.lock().await[idx] = request.clone();
        self.state.lock().await.in_progress.remove(&request.unique_key);
        self.persist().await
    }

    /// Returns a leased seed for another attempt, storing the caller's
    /// updated copy (retry bookkeeping included) so the next `fetch_next`
    /// for this seed sees it.
    pub async fn reclaim(&self, request: &Request, forefront: bool) -> Result<()> {
        let idx = self.leased_index(&request.unique_key).await?;
        self.requests.lock().await[idx] = request.clone();

        let mut state = self.state.lock().await;
        state.in_progress.remove(&request.unique_key);
        if forefront {
            state.reclaimed.push_front(request.unique_key.clone());
        } else {
            state.reclaimed.push_back(request.unique_key.clone());
        }
        drop(state);
        self.persist().await
    }

    async fn leased_index(&self, unique_key: &str) -> Result<usize> {
        let state = self.state.lock().await;
        state.in_progress.get(unique_key).copied().ok_or_else(|| {
            CrawlerError::Validation(format!(
                "operation on unique_key '{unique_key}' with no active lease for this client"
            ))
        })
    }

    pub async fn is_finished(&self) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state.next_index >= self.by_unique_key.len() && state.in_progress.is_empty() && state.reclaimed.is_empty())
    }

    pub async fn has_pending_work(&self) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state.next_index < self.by_unique_key.len() || !state.reclaimed.is_empty())
    }
}

#[async_trait]
impl RequestSource for RequestList {
    /// `RequestList` is seeded once from a fixed configuration and never
    /// grows at runtime; a caller asking to add a request at runtime
    /// almost certainly meant the queue half of a list+queue pairing,
    /// not this source.
    async fn add(&self, _request: Request, _forefront: bool) -> Result<shared::QueueOperationInfo> {
        warn!("add called on a RequestList, which does not support runtime insertion");
        Err(CrawlerError::Validation(
            "RequestList does not support runtime insertion; add requests via its constructor".into(),
        ))
    }

    async fn fetch_next(&self) -> Result<Option<Request>> {
        RequestList::fetch_next(self).await
    }

    async fn mark_handled(&self, request: &Request) -> Result<()> {
        RequestList::mark_handled(self, request).await
    }

    async fn reclaim(&self, request: &Request, forefront: bool) -> Result<()> {
        RequestList::reclaim(self, request, forefront).await
    }

    async fn is_finished(&self) -> Result<bool> {
        RequestList::is_finished(self).await
    }

    async fn has_pending_work(&self) -> Result<bool> {
        RequestList::has_pending_work(self).await
    }
}
