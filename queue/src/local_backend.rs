//! The in-memory reference `QueueBackend`: single process, no persistence.
//!
//! This backend never touches disk; it exists to give `RequestQueue`
//! something real to run against and to let tests exercise the
//! fetch/reclaim/finish algorithms end to end.

use crate::backend::{QueueBackend, QueueHeadItem, QueueHeadResult, QueueInfo};
use async_trait::async_trait;
use chrono::Utc;
use shared::{ids::derive_request_id, CrawlerError, QueueOperationInfo, Request};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
struct QueueRecord {
    request: Request,
    order_no: i64,
}

struct State {
    records: HashMap<String, QueueRecord>,
    unique_key_to_id: HashMap<String, String>,
    /// Monotonically increasing counter for normal (non-forefront) inserts.
    next_order_no: i64,
    /// Monotonically increasing but kept deeply negative, so forefront
    /// items always sort ahead of normal ones while still breaking ties
    /// among themselves by insertion order.
    next_forefront_order_no: i64,
    created_at: chrono::DateTime<Utc>,
    modified_at: chrono::DateTime<Utc>,
}

/// A single-process, in-memory emulation of a real queue backend. Never
/// reports `had_multiple_clients`, since by construction there is only one.
pub struct LocalQueueBackend {
    state: Mutex<State>,
}

impl LocalQueueBackend {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            state: Mutex::new(State {
                records: HashMap::new(),
                unique_key_to_id: HashMap::new(),
                next_order_no: 0,
                next_forefront_order_no: i64::MIN / 2,
                created_at: now,
                modified_at: now,
            }),
        }
    }
}

impl Default for LocalQueueBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueBackend for LocalQueueBackend {
    async fn add(&self, mut request: Request, forefront: bool) -> Result<QueueOperationInfo, CrawlerError> {
        let mut state = self.state.lock().await;

        if let Some(existing_id) = state.unique_key_to_id.get(&request.unique_key).cloned() {
            let existing = state.records.get(&existing_id).expect("dangling unique_key mapping");
            return Ok(QueueOperationInfo {
                request_id: existing_id,
                was_already_present: true,
                was_already_handled: existing.request.is_handled(),
                request: existing.request.clone(),
            });
        }

        let id = derive_request_id(&request.unique_key);
        request.assign_id(id.clone())?;

        let order_no = if forefront {
            let n = state.next_forefront_order_no;
            state.next_forefront_order_no += 1;
            n
        } else {
            let n = state.next_order_no;
            state.next_order_no += 1;
            n
        };

        state.unique_key_to_id.insert(request.unique_key.clone(), id.clone());
        state.records.insert(
            id.clone(),
            QueueRecord {
                request: request.clone(),
                order_no,
            },
        );
        state.modified_at = Utc::now();

        debug!(id = %id, unique_key = %request.unique_key, forefront, "backend add");

        Ok(QueueOperationInfo {
            request_id: id,
            was_already_present: false,
            was_already_handled: false,
            request,
        })
    }

    async fn update(&self, request: Request, forefront: bool) -> Result<QueueOperationInfo, CrawlerError> {
        let id = request
            .id
            .clone()
            .ok_or_else(|| CrawlerError::Validation("update requires an assigned request id".into()))?;

        let mut state = self.state.lock().await;
        let existing_order_no = state
            .records
            .get(&id)
            .ok_or_else(|| CrawlerError::Validation(format!("no such record: {id}")))?
            .order_no;

        let order_no = if forefront {
            let n = state.next_forefront_order_no;
            state.next_forefront_order_no += 1;
            n
        } else {
            existing_order_no
        };

        state.records.insert(
            id.clone(),
            QueueRecord {
                request: request.clone(),
                order_no,
            },
        );
        state.modified_at = Utc::now();

        debug!(id = %id, forefront, handled = request.is_handled(), "backend update");

        Ok(QueueOperationInfo {
            request_id: id,
            was_already_present: true,
            was_already_handled: request.is_handled(),
            request,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<Request>, CrawlerError> {
        let state = self.state.lock().await;
        Ok(state.records.get(id).map(|record| record.request.clone()))
    }

    async fn list_head(&self, limit: usize) -> Result<QueueHeadResult, CrawlerError> {
        let state = self.state.lock().await;
        let mut pending: Vec<&QueueRecord> = state
            .records
            .values()
            .filter(|record| !record.request.is_handled())
            .collect();
        pending.sort_by_key(|record| record.order_no);

        let items = pending
            .into_iter()
            .take(limit)
            .map(|record| QueueHeadItem {
                id: record.request.id.clone().expect("queued record always has an id"),
                unique_key: record.request.unique_key.clone(),
            })
            .collect();

        Ok(QueueHeadResult {
            items,
            queue_modified_at: state.modified_at,
            had_multiple_clients: false,
        })
    }

    async fn get_info(&self) -> Result<QueueInfo, CrawlerError> {
        let state = self.state.lock().await;
        let total = state.records.len() as u64;
        let handled = state.records.values().filter(|r| r.request.is_handled()).count() as u64;
        Ok(QueueInfo {
            total_request_count: total,
            handled_request_count: handled,
            pending_request_count: total - handled,
            created_at: state.created_at,
            modified_at: state.modified_at,
            accessed_at: Utc::now(),
        })
    }

    async fn delete(&self) -> Result<(), CrawlerError> {
        let mut state = self.state.lock().await;
        state.records.clear();
        state.unique_key_to_id.clear();
        state.modified_at = Utc::now();
        Ok(())
    }
}
