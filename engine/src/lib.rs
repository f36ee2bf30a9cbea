//! Autoscaled task pool and request lifecycle coordinator.
//!
//! This crate is the "when and how much" half of the crawling core: it
//! schedules concurrent work against live resource samples (`pool`,
//! `scaler`, `sampler`) and drives the fetch/handle/retry/complete pipeline
//! for a source of requests (`crawler`). It depends only on `shared` —
//! never on a concrete queue implementation — so any `shared::RequestSource`
//! can plug in.

pub mod config;
pub mod crawler;
pub mod pool;
pub mod sampler;
pub mod scaler;
pub mod task_controller;

pub use crawler::{Crawler, CrawlerConfig, FailedRequestHandler, RequestHandler};
pub use pool::{AutoscaledPool, PoolConfig, PoolSnapshot};
pub use sampler::{ResourceMonitor, ResourceSnapshot, SystemResourceMonitor};
pub use scaler::{ScalerConfig, ScalingController, ScalingState};
pub use task_controller::TaskController;

#[cfg(test)]
mod tests;
