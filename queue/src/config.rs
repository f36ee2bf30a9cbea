//! Deserializable configuration for the request queue and request list.
//!
//! Mirrors `engine::config`'s shape: one struct per tunable surface, with
//! `#[serde(default = "...")]` pointing at `shared::defaults`.

use anyhow::{Context, Result};
use serde::Deserialize;
use shared::defaults;
use std::path::Path;
use std::time::Duration;

/// Runtime tunables for [`crate::request_queue::RequestQueue`].
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    pub query_head_min_length: usize,
    pub storage_consistency_delay: Duration,
    pub api_processed_requests_delay: Duration,
    pub is_finished_consistency_retries: u32,
    pub unique_key_cache_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfigFile::default().into_runtime()
    }
}

/// Runtime tunables for [`crate::request_list::RequestList`].
#[derive(Debug, Clone, Copy)]
pub struct RequestListConfig {
    /// Deduplication on `unique_key` is optional and configurable. When
    /// `false` (the default), duplicate `unique_key`s across the seed
    /// list are dropped, keeping only the first.
    pub keep_duplicate_urls: bool,
}

impl Default for RequestListConfig {
    fn default() -> Self {
        RequestListConfigFile::default().into_runtime()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfigFile {
    pub query_head_min_length: usize,
    pub storage_consistency_delay_ms: u64,
    pub api_processed_requests_delay_ms: u64,
    pub is_finished_consistency_retries: u32,
    pub unique_key_cache_capacity: usize,
}

impl Default for QueueConfigFile {
    fn default() -> Self {
        Self {
            query_head_min_length: defaults::default_query_head_min_length(),
            storage_consistency_delay_ms: defaults::default_storage_consistency_delay_secs() * 1_000,
            api_processed_requests_delay_ms: defaults::default_api_processed_requests_delay_secs() * 1_000,
            is_finished_consistency_retries: defaults::default_is_finished_consistency_retries(),
            unique_key_cache_capacity: defaults::default_unique_key_cache_capacity(),
        }
    }
}

impl QueueConfigFile {
    pub fn validate(&self) -> Result<()> {
        if self.query_head_min_length == 0 {
            anyhow::bail!("query_head_min_length must be at least 1");
        }
        if self.unique_key_cache_capacity == 0 {
            anyhow::bail!("unique_key_cache_capacity must be at least 1");
        }
        Ok(())
    }

    pub fn into_runtime(self) -> QueueConfig {
        QueueConfig {
            query_head_min_length: self.query_head_min_length,
            storage_consistency_delay: Duration::from_millis(self.storage_consistency_delay_ms),
            api_processed_requests_delay: Duration::from_millis(self.api_processed_requests_delay_ms),
            is_finished_consistency_retries: self.is_finished_consistency_retries,
            unique_key_cache_capacity: self.unique_key_cache_capacity,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RequestListConfigFile {
    pub keep_duplicate_urls: bool,
}

impl Default for RequestListConfigFile {
    fn default() -> Self {
        Self {
            keep_duplicate_urls: defaults::default_keep_duplicate_urls(),
        }
    }
}

impl RequestListConfigFile {
    pub fn into_runtime(self) -> RequestListConfig {
        RequestListConfig {
            keep_duplicate_urls: self.keep_duplicate_urls,
        }
    }
}

/// Loads and validates both config surfaces from a single TOML file.
pub async fn load_queue_config(path: &Path) -> Result<(QueueConfig, RequestListConfig)> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    #[derive(Deserialize, Default)]
    #[serde(default)]
    struct QueueWorkspaceConfigFile {
        queue: QueueConfigFile,
        request_list: RequestListConfigFile,
    }

    let parsed: QueueWorkspaceConfigFile = toml::from_str(&content)
        .with_context(|| format!("TOML syntax error in {}", path.display()))?;

    parsed
        .queue
        .validate()
        .with_context(|| format!("invalid [queue] section in {}", path.display()))?;

    Ok((parsed.queue.into_runtime(), parsed.request_list.into_runtime()))
}
