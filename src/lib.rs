// src/lib.rs

//! Lightweight task runtime: submit closures that run off the calling
//! thread, observe them through status polling, blocking waits or callbacks,
//! chain continuations, and bound how many task trees run at once.
//!
//! The free functions here use [`Scheduler::global`]. Create a dedicated
//! [`Scheduler`] when you need separate ceilings or an explicit lifetime.
//!
//! ```no_run
//! let task = rtask::run(|_ctx| Ok::<_, rtask::TaskError>("task"));
//! let next = task.continue_with(|ctx| {
//!     let antecedent = ctx.antecedent().ok_or("not a continuation")?;
//!     Ok::<_, rtask::TaskError>(format!("{}+next", antecedent.name()))
//! });
//! assert!(rtask::wait_all(&[task, next], -1));
//! ```

pub mod app;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod scheduler;
pub mod sync;
pub mod task;
pub mod wait;

use serde::Serialize;
use serde_json::Value;

pub use crate::config::SchedulerConfig;
pub use crate::errors::{FaultKind, RtaskError, TaskError};
pub use crate::exec::WorkerId;
pub use crate::scheduler::{Scheduler, SchedulerBuilder, SchedulerStats};
pub use crate::task::{Attachment, Task, TaskContext, TaskId, TaskOptions, TaskStatus};
pub use crate::wait::{Timeout, wait_all, wait_any};

/// Create a task and submit it to the global scheduler. Non-blocking.
pub fn run<F, T, E>(work: F) -> Task
where
    F: Fn(&TaskContext) -> Result<T, E> + Send + Sync + 'static,
    T: Serialize,
    E: Into<TaskError>,
{
    Scheduler::global().run(work)
}

/// [`run`] with a name and bound parameters.
pub fn run_with<F, T, E>(options: TaskOptions, work: F) -> Task
where
    F: Fn(&TaskContext) -> Result<T, E> + Send + Sync + 'static,
    T: Serialize,
    E: Into<TaskError>,
{
    Scheduler::global().run_with(options, work)
}

/// Submit one task per item; the item is parameter 0.
///
/// Any `IntoIterator` works, so `None` yields no tasks.
pub fn run_each<I, V, F, T, E>(items: I, work: F) -> Vec<Task>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
    F: Fn(&TaskContext) -> Result<T, E> + Send + Sync + 'static,
    T: Serialize,
    E: Into<TaskError>,
{
    Scheduler::global().run_each(items, work)
}

/// [`run_each`] with the item's index as parameter 1.
pub fn run_each_with_index<I, V, F, T, E>(items: I, work: F) -> Vec<Task>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
    F: Fn(&TaskContext) -> Result<T, E> + Send + Sync + 'static,
    T: Serialize,
    E: Into<TaskError>,
{
    Scheduler::global().run_each_with_index(items, work)
}

pub fn from_result(value: impl Into<Value>) -> Task {
    Task::from_result(value)
}

pub fn from_exception(error: impl Into<TaskError>) -> Task {
    Task::from_exception(error)
}

pub fn from_canceled() -> Task {
    Task::from_canceled()
}

/// Concurrency ceiling of the global scheduler.
pub fn parallel_level() -> usize {
    Scheduler::global().parallel_level()
}

/// Set the global concurrency ceiling; `0` is ignored.
pub fn set_parallel_level(level: usize) -> bool {
    Scheduler::global().set_parallel_level(level)
}
