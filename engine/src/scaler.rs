//! The scale-up/scale-down formulas, isolated from the pool's scheduling
//! loop so they can be unit-tested against synthetic resource samples.

use crate::sampler::ResourceSnapshot;
use std::collections::VecDeque;
use tracing::{debug, info};

/// Tunables for [`ScalingController`].
#[derive(Debug, Clone)]
pub struct ScalerConfig {
    pub min_concurrency: usize,
    pub max_concurrency: usize,
    pub desired_concurrency_ratio: f64,
    pub scale_up_step_ratio: f64,
    pub scale_down_step_ratio: f64,
    pub min_free_memory_ratio: f64,
    pub max_memory_bytes: Option<u64>,
    /// Subtract the main process's own memory from the effective total
    /// before computing ratios, so the crawler's own footprint doesn't
    /// count against the headroom it is trying to measure.
    pub ignore_main_process: bool,
    pub scale_up_window: usize,
    pub scale_down_window: usize,
    /// Scale-up is evaluated only every Nth autoscale tick.
    pub scale_up_tick_interval: u64,
    pub scale_up_max_step: usize,
}

/// A snapshot of the controller's current read on the system, exposed
/// alongside the pool's own state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingState {
    pub concurrency: usize,
    pub is_memory_overloaded: bool,
    pub is_cpu_overloaded: bool,
}

/// Maintains the rolling resource windows and derives the current
/// concurrency target from them.
pub struct ScalingController {
    config: ScalerConfig,
    concurrency: usize,
    free_bytes_window: VecDeque<u64>,
    cpu_overload_window: VecDeque<bool>,
    tick_count: u64,
    last_state: ScalingState,
}

impl ScalingController {
    pub fn new(config: ScalerConfig) -> Self {
        Self::with_initial_concurrency(config.min_concurrency, config)
    }

    /// Like [`Self::new`] but seeds a starting `concurrency` other than
    /// `min_concurrency` — used to resume a previously computed value, or
    /// by tests that want to exercise scale-down from a known point.
    pub fn with_initial_concurrency(concurrency: usize, config: ScalerConfig) -> Self {
        Self {
            last_state: ScalingState {
                concurrency,
                is_memory_overloaded: false,
                is_cpu_overloaded: false,
            },
            config,
            concurrency,
            free_bytes_window: VecDeque::new(),
            cpu_overload_window: VecDeque::new(),
            tick_count: 0,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn state(&self) -> ScalingState {
        self.last_state
    }

    fn effective_total(&self, snapshot: &ResourceSnapshot) -> u64 {
        let mut total = snapshot.total_bytes;
        if self.config.ignore_main_process {
            total = total.saturating_sub(snapshot.main_process_bytes);
        }
        if let Some(cap) = self.config.max_memory_bytes {
            total = total.min(cap);
        }
        total.max(1)
    }

    /// Feed one autoscale-interval sample and return the new concurrency.
    ///
    /// `running_count` is the pool's current in-flight task count, used to
    /// compute utilization for the scale-up decision.
    pub fn tick(&mut self, snapshot: ResourceSnapshot, cpu_overloaded: bool, running_count: usize) -> usize {
        self.tick_count += 1;

        let effective_total = self.effective_total(&snapshot);

        self.free_bytes_window.push_back(snapshot.free_bytes);
        while self.free_bytes_window.len() > self.config.scale_up_window {
            self.free_bytes_window.pop_front();
        }

        self.cpu_overload_window.push_back(cpu_overloaded);
        while self.cpu_overload_window.len() > self.config.scale_down_window {
            self.cpu_overload_window.pop_front();
        }

        let mean_free = mean(&self.free_bytes_window);
        let is_memory_overloaded =
            (mean_free / effective_total as f64) < self.config.min_free_memory_ratio;
        let is_cpu_overloaded = !self.cpu_overload_window.is_empty()
            && self.cpu_overload_window.iter().all(|overloaded| *overloaded);

        let mut scaled_down = false;
        if self.concurrency > self.config.min_concurrency
            && (is_memory_overloaded || is_cpu_overloaded)
        {
            let stepped = (self.concurrency as f64 * (1.0 - self.config.scale_down_step_ratio))
                .floor() as usize;
            let new_concurrency = stepped.max(self.config.min_concurrency);
            if new_concurrency < self.concurrency {
                info!(
                    from = self.concurrency,
                    to = new_concurrency,
                    memory_overloaded = is_memory_overloaded,
                    cpu_overloaded = is_cpu_overloaded,
                    "scaling down"
                );
                self.concurrency = new_concurrency;
                scaled_down = true;
            }
        }

        if !scaled_down
            && self.tick_count % self.config.scale_up_tick_interval == 0
            && self.concurrency < self.config.max_concurrency
        {
            let utilization = running_count as f64 / self.concurrency as f64;
            if utilization >= self.config.desired_concurrency_ratio {
                let min_free_bytes = self
                    .free_bytes_window
                    .iter()
                    .copied()
                    .min()
                    .unwrap_or(snapshot.free_bytes);
                let used_ratio = 1.0 - (min_free_bytes as f64 / effective_total as f64);
                let per_instance_ratio = if running_count > 0 {
                    used_ratio / running_count as f64
                } else {
                    0.0
                };

                if per_instance_ratio > 0.0 {
                    let headroom_ratio = (min_free_bytes as f64 / effective_total as f64)
                        - self.config.min_free_memory_ratio;
                    let headroom = (headroom_ratio / per_instance_ratio).floor();
                    if headroom > 0.0 {
                        let step = (headroom as usize).min(self.config.scale_up_max_step);
                        let new_concurrency =
                            (self.concurrency + step).min(self.config.max_concurrency);
                        if new_concurrency > self.concurrency {
                            debug!(
                                from = self.concurrency,
                                to = new_concurrency,
                                utilization,
                                "scaling up"
                            );
                            self.concurrency = new_concurrency;
                        }
                    }
                }
            }
        }

        self.last_state = ScalingState {
            concurrency: self.concurrency,
            is_memory_overloaded,
            is_cpu_overloaded,
        };

        self.concurrency
    }
}

fn mean(window: &VecDeque<u64>) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let sum: u64 = window.iter().sum();
    sum as f64 / window.len() as f64
}
