//! The autoscaled task pool: the only place `running_count` and
//! `concurrency` are mutated. Everything here is driven by a single
//! cooperative loop (`run`'s `tokio::select!`) — state changes never race
//! because only one branch of the loop runs at a time.

use crate::sampler::ResourceMonitor;
use crate::scaler::{ScalerConfig, ScalingController};
use crate::task_controller::TaskController;
use shared::CrawlerError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Tunables for [`AutoscaledPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub min_concurrency: usize,
    pub max_concurrency: usize,
    pub desired_concurrency_ratio: f64,
    pub scale_up_step_ratio: f64,
    pub scale_down_step_ratio: f64,
    pub maybe_run_interval: Duration,
    pub autoscale_interval: Duration,
    pub task_timeout: Option<Duration>,
    pub max_memory_bytes: Option<u64>,
    pub min_free_memory_ratio: f64,
    pub ignore_main_process: bool,
    pub logging_interval: Option<Duration>,
    pub scale_up_window: usize,
    pub scale_down_window: usize,
    pub scale_up_tick_interval: u64,
    pub scale_up_max_step: usize,
}

impl PoolConfig {
    fn scaler_config(&self) -> ScalerConfig {
        ScalerConfig {
            min_concurrency: self.min_concurrency,
            max_concurrency: self.max_concurrency,
            desired_concurrency_ratio: self.desired_concurrency_ratio,
            scale_up_step_ratio: self.scale_up_step_ratio,
            scale_down_step_ratio: self.scale_down_step_ratio,
            min_free_memory_ratio: self.min_free_memory_ratio,
            max_memory_bytes: self.max_memory_bytes,
            ignore_main_process: self.ignore_main_process,
            scale_up_window: self.scale_up_window,
            scale_down_window: self.scale_down_window,
            scale_up_tick_interval: self.scale_up_tick_interval,
            scale_up_max_step: self.scale_up_max_step,
        }
    }
}

/// A read-only view of the pool's state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolSnapshot {
    pub running_count: usize,
    pub concurrency: usize,
    pub is_memory_overloaded: bool,
    pub is_cpu_overloaded: bool,
}

struct PoolInner<C: TaskController> {
    controller: Arc<C>,
    resource_monitor: Arc<dyn ResourceMonitor>,
    config: PoolConfig,
    scaler: Mutex<ScalingController>,
    running_count: AtomicUsize,
    concurrency: AtomicUsize,
    paused: AtomicBool,
    aborted: AtomicBool,
    cancelled_externally: AtomicBool,
    finished: AtomicBool,
    predicate_in_flight: AtomicBool,
    first_error: Mutex<Option<CrawlerError>>,
}

/// Schedules at most `concurrency` concurrent tasks drawn from a
/// [`TaskController`], adapting `concurrency` to live resource samples.
///
/// Cheap to clone: clones share the same underlying state, so one clone can
/// call `run()` while another calls `abort()`/`pause()`/`resume()`.
pub struct AutoscaledPool<C: TaskController> {
    inner: Arc<PoolInner<C>>,
}

impl<C: TaskController> Clone for AutoscaledPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: TaskController + 'static> AutoscaledPool<C> {
    pub fn new(controller: Arc<C>, resource_monitor: Arc<dyn ResourceMonitor>, config: PoolConfig) -> Self {
        let scaler = ScalingController::new(config.scaler_config());
        let concurrency = config.min_concurrency;
        Self {
            inner: Arc::new(PoolInner {
                controller,
                resource_monitor,
                config,
                scaler: Mutex::new(scaler),
                running_count: AtomicUsize::new(0),
                concurrency: AtomicUsize::new(concurrency),
                paused: AtomicBool::new(false),
                aborted: AtomicBool::new(false),
                cancelled_externally: AtomicBool::new(false),
                finished: AtomicBool::new(false),
                predicate_in_flight: AtomicBool::new(false),
                first_error: Mutex::new(None),
            }),
        }
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let state = read_scaling_state(&self.inner);
        PoolSnapshot {
            running_count: self.inner.running_count.load(Ordering::SeqCst),
            concurrency: self.inner.concurrency.load(Ordering::SeqCst),
            is_memory_overloaded: state.is_memory_overloaded,
            is_cpu_overloaded: state.is_cpu_overloaded,
        }
    }

    /// Stops the pool immediately: no new tasks are started. In-flight tasks
    /// are not forcibly cancelled — they are expected to honor their own
    /// `task_timeout` — so `run()` returns once they all complete, unless a
    /// task error was already recorded, in which case that error wins.
    pub fn abort(&self) {
        info!("aborting pool");
        self.inner.aborted.store(true, Ordering::SeqCst);
        self.inner.cancelled_externally.store(true, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        debug!("pausing pool");
        self.inner.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        debug!("resuming pool");
        self.inner.paused.store(false, Ordering::SeqCst);
    }

    /// Runs the pool to completion, starting tasks as slack and readiness
    /// allow and resolving once all work is drained.
    pub async fn run(&self) -> Result<(), CrawlerError> {
        info!("pool run starting");
        let mut join_set: JoinSet<Result<(), CrawlerError>> = JoinSet::new();
        let mut maybe_run_interval = tokio::time::interval(self.inner.config.maybe_run_interval);
        let mut autoscale_interval = tokio::time::interval(self.inner.config.autoscale_interval);
        let mut logging_interval = self.inner.config.logging_interval.map(tokio::time::interval);

        self.maybe_start(&mut join_set).await;

        loop {
            if self.inner.finished.load(Ordering::SeqCst) {
                break;
            }
            if self.inner.aborted.load(Ordering::SeqCst)
                && self.inner.running_count.load(Ordering::SeqCst) == 0
            {
                break;
            }

            tokio::select! {
                _ = maybe_run_interval.tick() => {
                    self.maybe_start(&mut join_set).await;
                }
                _ = autoscale_interval.tick() => {
                    self.autoscale_tick().await;
                }
                _ = tick_optional(&mut logging_interval) => {
                    let snapshot = self.snapshot();
                    info!(
                        running_count = snapshot.running_count,
                        concurrency = snapshot.concurrency,
                        is_memory_overloaded = snapshot.is_memory_overloaded,
                        is_cpu_overloaded = snapshot.is_cpu_overloaded,
                        "pool state"
                    );
                }
                Some(result) = join_set.join_next(), if !join_set.is_empty() => {
                    self.inner.running_count.fetch_sub(1, Ordering::SeqCst);
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => self.record_first_error(err).await,
                        Err(join_err) => {
                            self.record_first_error(CrawlerError::FatalBackend(join_err.to_string())).await
                        }
                    }
                    self.maybe_start(&mut join_set).await;
                }
            }
        }

        if let Some(err) = self.inner.first_error.lock().await.take() {
            return Err(err);
        }
        if self.inner.cancelled_externally.load(Ordering::SeqCst) {
            return Err(CrawlerError::Cancelled);
        }
        info!("pool run finished cleanly");
        Ok(())
    }

    async fn record_first_error(&self, err: CrawlerError) {
        warn!(error = %err, "task failed, pool will stop starting new tasks");
        let mut guard = self.inner.first_error.lock().await;
        if guard.is_none() {
            *guard = Some(err);
        }
        drop(guard);
        self.inner.aborted.store(true, Ordering::SeqCst);
    }

    /// Starts as many tasks as slack and readiness allow, one at a time,
    /// looping in place rather than recursing.
    async fn maybe_start(&self, join_set: &mut JoinSet<Result<(), CrawlerError>>) {
        loop {
            if self.inner.aborted.load(Ordering::SeqCst) || self.inner.paused.load(Ordering::SeqCst) {
                return;
            }

            let running = self.inner.running_count.load(Ordering::SeqCst);
            let concurrency = self.inner.concurrency.load(Ordering::SeqCst);
            if running >= concurrency {
                return;
            }

            if self.inner.predicate_in_flight.swap(true, Ordering::SeqCst) {
                return;
            }

            let ready = self.inner.controller.is_task_ready().await;
            if !ready {
                self.inner.predicate_in_flight.store(false, Ordering::SeqCst);
                self.maybe_finish().await;
                return;
            }

            let produced = self.inner.controller.produce().await;
            self.inner.predicate_in_flight.store(false, Ordering::SeqCst);

            match produced {
                None => {
                    self.maybe_finish().await;
                    return;
                }
                Some(task) => {
                    self.inner.running_count.fetch_add(1, Ordering::SeqCst);
                    let timeout = self.inner.config.task_timeout;
                    join_set.spawn(run_with_timeout(task, timeout));
                }
            }
        }
    }

    async fn maybe_finish(&self) {
        if self.inner.running_count.load(Ordering::SeqCst) == 0 && self.inner.controller.is_finished().await {
            info!("task controller reports finished, draining pool");
            self.inner.finished.store(true, Ordering::SeqCst);
        }
    }

    async fn autoscale_tick(&self) {
        let snapshot = self.inner.resource_monitor.snapshot().await;
        let cpu_overloaded = self.inner.resource_monitor.is_cpu_overloaded().await;
        let running_count = self.inner.running_count.load(Ordering::SeqCst);

        let mut scaler = self.inner.scaler.lock().await;
        let new_concurrency = scaler.tick(snapshot, cpu_overloaded, running_count);
        drop(scaler);

        self.inner.concurrency.store(new_concurrency, Ordering::SeqCst);
    }
}

/// Ticks `interval` if configured; never resolves when `None`, so the
/// `logging_interval` branch in `run`'s `select!` simply never wins when
/// state-logging is disabled.
async fn tick_optional(interval: &mut Option<tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Runs a produced task, failing it with `Timeout` if it outlives the
/// configured `task_timeout`. Tasks are never forcibly cancelled beyond
/// this: dropping the joined future at shutdown is the only cancellation
/// the pool performs.
async fn run_with_timeout<T>(task: T, timeout: Option<Duration>) -> Result<(), CrawlerError>
where
    T: Future<Output = Result<(), CrawlerError>> + Send + 'static,
{
    match timeout {
        Some(duration) => match tokio::time::timeout(duration, task).await {
            Ok(result) => result,
            Err(_) => Err(CrawlerError::Timeout(duration)),
        },
        None => task.await,
    }
}

/// Reads the scaler's last-computed state without requiring `snapshot()` to
/// be async; the scaler already caches it from the most recent tick.
fn read_scaling_state<C: TaskController>(inner: &PoolInner<C>) -> crate::scaler::ScalingState {
    match inner.scaler.try_lock() {
        Ok(scaler) => scaler.state(),
        Err(_) => crate::scaler::ScalingState {
            concurrency: inner.concurrency.load(Ordering::SeqCst),
            is_memory_overloaded: false,
            is_cpu_overloaded: false,
        },
    }
}
