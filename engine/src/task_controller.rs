//! The producer/predicate contract the pool drives.
//!
//! Rather than wiring three independent closures into the pool, a single
//! `TaskController` implementation keeps ownership of the underlying
//! state in one place instead of three captured closures with tangled
//! lifetimes.

use async_trait::async_trait;

/// Produces tasks for the [`AutoscaledPool`](crate::pool::AutoscaledPool) to run and tells it
/// when there is more work and when there is none left.
///
/// The pool never calls these concurrently with themselves: at most one of
/// `produce`, `is_task_ready`, `is_finished` is in flight at a time per
/// controller.
#[async_trait]
pub trait TaskController: Send + Sync {
    /// The unit of work produced. Each call to `produce` yields a future
    /// the pool will drive to completion on its own task.
    type Task: Send + 'static;

    /// Produce the next task, or `None` if there is nothing to run right now.
    async fn produce(&self) -> Option<Self::Task>;

    /// Cheap, conservative check for whether `produce` is likely to yield
    /// a task. Returning `false` when uncertain is always safe; the pool
    /// simply re-checks on the next tick.
    async fn is_task_ready(&self) -> bool;

    /// True once there is no more work and none in flight. Only queried by
    /// the pool when `running_count == 0` and `is_task_ready()` is false.
    async fn is_finished(&self) -> bool;
}
