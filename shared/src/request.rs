//! The `Request` type and its builder
//!
//! `unique_key` is stable once computed, `id` is assigned by the queue
//! exactly once and never mutated thereafter, `retry_count` only
//! increases, and `handled_at` is set iff the request reached a terminal
//! `mark_handled`.

use crate::error::CrawlerError;
use crate::utils::canonicalize_url;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A unit of crawl work. Identified within a queue by `unique_key`;
/// `id` only exists once a queue has accepted the request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    /// Assigned by the queue on first `add`. Never set by a caller.
    pub id: Option<String>,
    pub url: String,
    pub unique_key: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub payload: Option<Vec<u8>>,
    #[serde(default)]
    pub user_data: serde_json::Value,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub error_messages: Vec<String>,
    #[serde(default)]
    pub handled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub no_retry: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

impl Request {
    /// Start building a request for `url`, with `unique_key` defaulting to
    /// the canonicalized url.
    pub fn builder(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(url.into())
    }

    /// Convenience constructor equivalent to `Request::builder(url).build()`.
    pub fn new(url: impl Into<String>) -> Result<Self, CrawlerError> {
        Self::builder(url).build()
    }

    /// True once this request has reached a terminal `mark_handled`.
    pub fn is_handled(&self) -> bool {
        self.handled_at.is_some()
    }

    /// Assign the queue-issued id. Rejects a second assignment: `id` must
    /// never mutate once set.
    pub fn assign_id(&mut self, id: String) -> Result<(), CrawlerError> {
        if self.id.is_some() {
            return Err(CrawlerError::Validation(format!(
                "request for unique_key '{}' already has id '{}'",
                self.unique_key,
                self.id.as_deref().unwrap_or("")
            )));
        }
        self.id = Some(id);
        Ok(())
    }

    /// Append an error message and bump `retry_count`. Called once a
    /// reclaim for this attempt has been accepted by the queue, so a
    /// reclaim that itself fails never burns a retry the queue never
    /// recorded.
    pub fn record_retry(&mut self, error_message: impl Into<String>) {
        self.error_messages.push(error_message.into());
        self.retry_count += 1;
    }

    /// Mark this request as terminally handled.
    pub fn mark_handled(&mut self) {
        self.handled_at = Some(Utc::now());
    }
}

/// Builder for `Request`, following the same "required fields up front,
/// optional fields as chained setters" shape used throughout this
/// workspace's data-model builders.
pub struct RequestBuilder {
    url: String,
    unique_key: Option<String>,
    method: String,
    headers: HashMap<String, String>,
    payload: Option<Vec<u8>>,
    user_data: serde_json::Value,
    no_retry: bool,
}

impl RequestBuilder {
    fn new(url: String) -> Self {
        Self {
            url,
            unique_key: None,
            method: default_method(),
            headers: HashMap::new(),
            payload: None,
            user_data: serde_json::Value::Null,
            no_retry: false,
        }
    }

    /// Override the default (canonicalized-url) unique key.
    pub fn unique_key(mut self, key: impl Into<String>) -> Self {
        self.unique_key = Some(key.into());
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn user_data(mut self, user_data: serde_json::Value) -> Self {
        self.user_data = user_data;
        self
    }

    pub fn no_retry(mut self, no_retry: bool) -> Self {
        self.no_retry = no_retry;
        self
    }

    pub fn build(self) -> Result<Request, CrawlerError> {
        let unique_key = match self.unique_key {
            Some(key) => key,
            None => canonicalize_url(&self.url)?,
        };

        Ok(Request {
            id: None,
            url: self.url,
            unique_key,
            method: self.method,
            headers: self.headers,
            payload: self.payload,
            user_data: self.user_data,
            retry_count: 0,
            error_messages: Vec::new(),
            handled_at: None,
            no_retry: self.no_retry,
        })
    }
}
