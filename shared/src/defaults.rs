//! Default values for configuration parameters
//!
//! This module centralizes the default value functions used by the
//! `engine` and `queue` config structures. These functions back the
//! `#[serde(default = "...")]` attributes so a config file only needs to
//! name the fields it wants to override.

// Pool defaults

pub fn default_min_concurrency() -> usize {
    1
}

pub fn default_max_concurrency() -> usize {
    1000
}

pub fn default_desired_concurrency_ratio() -> f64 {
    0.95
}

pub fn default_scale_up_step_ratio() -> f64 {
    0.05
}

pub fn default_scale_down_step_ratio() -> f64 {
    0.05
}

pub fn default_maybe_run_interval_ms() -> u64 {
    500
}

pub fn default_autoscale_interval_ms() -> u64 {
    1_000
}

pub fn default_min_free_memory_ratio() -> f64 {
    0.2
}

pub fn default_scale_up_window() -> usize {
    5
}

pub fn default_scale_down_window() -> usize {
    5
}

/// Scale-up is evaluated only on every Nth autoscale tick.
pub fn default_scale_up_tick_interval() -> u32 {
    10
}

pub fn default_scale_up_max_step() -> usize {
    10
}

// Crawler defaults

pub fn default_max_request_retries() -> u32 {
    3
}

// Queue / request-list defaults

/// Lower bound on `limit` passed to `list_head` by the fetch algorithm.
pub fn default_query_head_min_length() -> usize {
    100
}

/// Bounded wait absorbing read-your-write lag after a reclaim; an
/// anti-flake window, not a correctness guarantee.
pub fn default_storage_consistency_delay_secs() -> u64 {
    3
}

/// Minimum age a `queue_modified_at` must have before an empty,
/// multi-client head is trusted as finished.
pub fn default_api_processed_requests_delay_secs() -> u64 {
    10
}

/// Bounded retry count for `is_finished`'s re-query loop.
pub fn default_is_finished_consistency_retries() -> u32 {
    3
}

/// Capacity of the per-queue unique-key → id LRU cache.
pub fn default_unique_key_cache_capacity() -> usize {
    100_000
}

/// Seed entries are deduplicated by `unique_key` by default; set
/// `keep_duplicate_urls` to disable it.
pub fn default_keep_duplicate_urls() -> bool {
    false
}
