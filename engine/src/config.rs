//! Deserializable configuration for the pool and the crawler.
//!
//! One struct per tunable surface, with `#[serde(default = "...")]`
//! pointing at `shared::defaults` so a config file only needs to name
//! what it overrides.

use crate::crawler::CrawlerConfig;
use crate::pool::PoolConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use shared::defaults;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfigFile {
    pub min_concurrency: usize,
    pub max_concurrency: usize,
    pub desired_concurrency_ratio: f64,
    pub scale_up_step_ratio: f64,
    pub scale_down_step_ratio: f64,
    pub maybe_run_interval_ms: u64,
    pub autoscale_interval_ms: u64,
    pub task_timeout_ms: Option<u64>,
    pub max_memory_bytes: Option<u64>,
    pub min_free_memory_ratio: f64,
    pub ignore_main_process: bool,
    pub logging_interval_ms: Option<u64>,
    pub scale_up_window: usize,
    pub scale_down_window: usize,
    pub scale_up_tick_interval: u32,
    pub scale_up_max_step: usize,
}

impl Default for PoolConfigFile {
    fn default() -> Self {
        Self {
            min_concurrency: defaults::default_min_concurrency(),
            max_concurrency: defaults::default_max_concurrency(),
            desired_concurrency_ratio: defaults::default_desired_concurrency_ratio(),
            scale_up_step_ratio: defaults::default_scale_up_step_ratio(),
            scale_down_step_ratio: defaults::default_scale_down_step_ratio(),
            maybe_run_interval_ms: defaults::default_maybe_run_interval_ms(),
            autoscale_interval_ms: defaults::default_autoscale_interval_ms(),
            task_timeout_ms: None,
            max_memory_bytes: None,
            min_free_memory_ratio: defaults::default_min_free_memory_ratio(),
            ignore_main_process: false,
            logging_interval_ms: None,
            scale_up_window: defaults::default_scale_up_window(),
            scale_down_window: defaults::default_scale_down_window(),
            scale_up_tick_interval: defaults::default_scale_up_tick_interval(),
            scale_up_max_step: defaults::default_scale_up_max_step(),
        }
    }
}

impl PoolConfigFile {
    /// Semantic validation beyond what `serde` checks structurally.
    pub fn validate(&self) -> Result<()> {
        if self.min_concurrency < 1 {
            anyhow::bail!("min_concurrency must be at least 1");
        }
        if self.max_concurrency < self.min_concurrency {
            anyhow::bail!(
                "max_concurrency ({}) must be >= min_concurrency ({})",
                self.max_concurrency,
                self.min_concurrency
            );
        }
        if !(0.0..1.0).contains(&self.desired_concurrency_ratio) {
            anyhow::bail!("desired_concurrency_ratio must be in (0, 1)");
        }
        if !(0.0..=1.0).contains(&self.min_free_memory_ratio) {
            anyhow::bail!("min_free_memory_ratio must be in [0, 1]");
        }
        if self.scale_up_tick_interval == 0 {
            anyhow::bail!("scale_up_tick_interval must be >= 1");
        }
        Ok(())
    }

    pub fn into_runtime(self) -> PoolConfig {
        PoolConfig {
            min_concurrency: self.min_concurrency,
            max_concurrency: self.max_concurrency,
            desired_concurrency_ratio: self.desired_concurrency_ratio,
            scale_up_step_ratio: self.scale_up_step_ratio,
            scale_down_step_ratio: self.scale_down_step_ratio,
            maybe_run_interval: Duration::from_millis(self.maybe_run_interval_ms),
            autoscale_interval: Duration::from_millis(self.autoscale_interval_ms),
            task_timeout: self.task_timeout_ms.map(Duration::from_millis),
            max_memory_bytes: self.max_memory_bytes,
            min_free_memory_ratio: self.min_free_memory_ratio,
            ignore_main_process: self.ignore_main_process,
            logging_interval: self.logging_interval_ms.map(Duration::from_millis),
            scale_up_window: self.scale_up_window,
            scale_down_window: self.scale_down_window,
            scale_up_tick_interval: self.scale_up_tick_interval as u64,
            scale_up_max_step: self.scale_up_max_step,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfigFile {
    pub max_request_retries: u32,
    pub max_requests_per_crawl: Option<u64>,
    pub handle_page_timeout_ms: u64,
    pub retry_forefront: bool,
}

impl Default for CrawlerConfigFile {
    fn default() -> Self {
        Self {
            max_request_retries: defaults::default_max_request_retries(),
            max_requests_per_crawl: None,
            handle_page_timeout_ms: 60_000,
            retry_forefront: true,
        }
    }
}

impl CrawlerConfigFile {
    pub fn into_runtime(self) -> CrawlerConfig {
        CrawlerConfig {
            max_request_retries: self.max_request_retries,
            max_requests_per_crawl: self.max_requests_per_crawl,
            handle_page_timeout: Duration::from_millis(self.handle_page_timeout_ms),
            retry_forefront: self.retry_forefront,
        }
    }
}

/// Loads and validates both config surfaces from a single TOML file.
pub async fn load_engine_config(path: &Path) -> Result<(PoolConfig, CrawlerConfig)> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    #[derive(Deserialize, Default)]
    #[serde(default)]
    struct EngineConfigFile {
        pool: PoolConfigFile,
        crawler: CrawlerConfigFile,
    }

    let parsed: EngineConfigFile = toml::from_str(&content)
        .with_context(|| format!("TOML syntax error in {}", path.display()))?;

    parsed
        .pool
        .validate()
        .with_context(|| format!("invalid [pool] section in {}", path.display()))?;

    Ok((parsed.pool.into_runtime(), parsed.crawler.into_runtime()))
}
