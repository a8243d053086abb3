// src/scheduler/mod.rs

//! Bounded-concurrency admission control.
//!
//! A [`Scheduler`] owns a FIFO of pending tasks, a running-tree counter and a
//! concurrency ceiling. A single monitor loop (see [`monitor`]) admits
//! pending tasks while the counter is below the ceiling and otherwise parks
//! until a submission or a finished tree wakes it.
//!
//! - [`queue`] is the pending FIFO.
//! - [`monitor`] is the admission loop and tree dispatch.
//! - [`global`] holds the lazily built process-wide default scheduler used by
//!   the free functions in the crate root.

pub(crate) mod global;
pub(crate) mod monitor;
pub(crate) mod queue;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{SchedulerConfig, validate_config};
use crate::errors::{Result, RtaskError, TaskError};
use crate::exec::{ThreadWorkerBackend, WorkerBackend, WorkerId, WorkerJob};
use crate::task::{Task, TaskContext, TaskOptions};

use queue::PendingQueue;

/// Handle to scheduler state that tasks and coordinators keep.
pub(crate) type SchedulerRef = Arc<Shared>;

/// Result of one admission decision.
pub(crate) enum Admission {
    Dispatch(Task),
    Idle,
    Saturated,
    Closed,
}

/// Scheduler state shared with the monitor loop, coordinators and tasks.
pub(crate) struct Shared {
    queue: Mutex<PendingQueue>,
    running: AtomicUsize,
    parallel_level: AtomicUsize,
    wake: Notify,
    monitor: Mutex<Option<JoinHandle<()>>>,
    active: Mutex<HashMap<WorkerId, WorkerJob>>,
    backend: Arc<dyn WorkerBackend>,
    handle: Handle,
    closed: AtomicBool,
}

impl Shared {
    fn new(parallel_level: usize, backend: Arc<dyn WorkerBackend>, handle: Handle) -> Self {
        Self {
            queue: Mutex::new(PendingQueue::new()),
            running: AtomicUsize::new(0),
            parallel_level: AtomicUsize::new(parallel_level),
            wake: Notify::new(),
            monitor: Mutex::new(None),
            active: Mutex::new(HashMap::new()),
            backend,
            handle,
            closed: AtomicBool::new(false),
        }
    }

    /// Queue `task`, mark it `Pending` and make sure the monitor loop is
    /// awake.
    pub fn submit(self: &Arc<Self>, task: &Task) {
        let pending = {
            let mut queue = self.queue();
            queue.push(task.clone());
            task.mark_pending(Arc::clone(self));
            queue.len()
        };

        debug!(task = %task.name(), pending, "task queued");
        self.ensure_monitor();
    }

    /// Remove `task` from the pending queue if it is still there.
    pub fn withdraw(&self, task: &Task) -> bool {
        let removed = self.queue().remove(task);
        if removed > 0 {
            debug!(task = %task.name(), removed, "task withdrawn from pending queue");
        }
        removed > 0
    }

    pub fn pending_count(&self) -> usize {
        self.queue().len()
    }

    pub fn running_count(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    pub fn parallel_level(&self) -> usize {
        self.parallel_level.load(Ordering::Acquire)
    }

    pub fn set_parallel_level(&self, level: usize) -> bool {
        if level == 0 {
            warn!(
                kept = self.parallel_level(),
                "ignoring non-positive parallel level"
            );
            return false;
        }

        let previous = self.parallel_level.swap(level, Ordering::AcqRel);
        info!(previous, level, "parallel level changed");
        // A raised ceiling may admit queued work right away.
        self.wake.notify_one();
        true
    }

    /// Decide what the monitor loop does next.
    pub(crate) fn admit_next(&self) -> Admission {
        if self.closed.load(Ordering::Acquire) {
            return Admission::Closed;
        }

        loop {
            if self.running_count() >= self.parallel_level() {
                return Admission::Saturated;
            }

            let Some(task) = self.queue().pop() else {
                return Admission::Idle;
            };

            if task.is_canceled() {
                debug!(task = %task.name(), "dropping cancelled task at admission");
                continue;
            }

            // Only the monitor loop increments, so check-then-add is safe.
            self.running.fetch_add(1, Ordering::AcqRel);
            return Admission::Dispatch(task);
        }
    }

    pub(crate) async fn parked(&self) {
        self.wake.notified().await;
    }

    pub(crate) fn track(&self, job: WorkerJob) {
        self.active().insert(job.worker().id(), job);
    }

    /// Give back the running slot held by `worker`'s tree.
    pub fn release(&self, worker: WorkerId) {
        self.active().remove(&worker);
        let previous = self.running.fetch_sub(1, Ordering::AcqRel);
        debug!(%worker, running = previous.saturating_sub(1), "tree finished; slot released");
        self.wake.notify_one();
    }

    pub(crate) fn backend(&self) -> &Arc<dyn WorkerBackend> {
        &self.backend
    }

    /// Cancel everything queued and everything running.
    pub fn cancel_all(&self) -> usize {
        let pending = self.queue().drain();
        for task in &pending {
            task.cancel();
        }

        let running: Vec<WorkerJob> = self.active().values().cloned().collect();
        for job in &running {
            job.worker().cancel();
            for task in job.tasks() {
                task.abandon();
            }
        }

        info!(
            pending = pending.len(),
            running = running.len(),
            "cancelled all outstanding work"
        );
        pending.len() + running.len()
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel_all();
        self.wake.notify_one();
        debug!("scheduler shut down");
    }

    fn ensure_monitor(self: &Arc<Self>) {
        if self.closed.load(Ordering::Acquire) {
            warn!("scheduler is shut down; queued task will not be dispatched");
            return;
        }

        let mut monitor = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match monitor.as_ref() {
            Some(handle) if !handle.is_finished() => self.wake.notify_one(),
            _ => {
                *monitor = Some(self.handle.spawn(monitor::monitor_loop(Arc::clone(self))));
            }
        }
    }

    fn queue(&self) -> MutexGuard<'_, PendingQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn active(&self) -> MutexGuard<'_, HashMap<WorkerId, WorkerJob>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time counters, mostly for logs and the CLI summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub pending: usize,
    pub running: usize,
    pub parallel_level: usize,
}

/// Bounded-concurrency task scheduler.
///
/// Dropping a scheduler cancels its outstanding work, stops its monitor loop
/// and, if it owns a runtime, releases that runtime in the background.
pub struct Scheduler {
    shared: SchedulerRef,
    runtime: Option<Runtime>,
}

impl Scheduler {
    /// Build a scheduler with its own tokio runtime.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Build a scheduler that runs on an existing tokio runtime.
    pub fn with_handle(config: SchedulerConfig, handle: Handle) -> Result<Self> {
        Self::builder().config(config).handle(handle).build()
    }

    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::default()
    }

    /// Queue `task` for execution.
    pub fn submit(&self, task: &Task) {
        self.shared.submit(task);
    }

    /// Remove `task` from the pending queue; no effect once it was admitted.
    pub fn withdraw(&self, task: &Task) -> bool {
        self.shared.withdraw(task)
    }

    /// Create a task and submit it.
    pub fn run<F, T, E>(&self, work: F) -> Task
    where
        F: Fn(&TaskContext) -> std::result::Result<T, E> + Send + Sync + 'static,
        T: Serialize,
        E: Into<TaskError>,
    {
        self.run_with(TaskOptions::default(), work)
    }

    pub fn run_with<F, T, E>(&self, options: TaskOptions, work: F) -> Task
    where
        F: Fn(&TaskContext) -> std::result::Result<T, E> + Send + Sync + 'static,
        T: Serialize,
        E: Into<TaskError>,
    {
        let task = Task::with_options(options, work);
        self.submit(&task);
        task
    }

    /// Submit one task per item, passing the item as parameter 0.
    ///
    /// Tasks are returned in input order.
    pub fn run_each<I, V, F, T, E>(&self, items: I, work: F) -> Vec<Task>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
        F: Fn(&TaskContext) -> std::result::Result<T, E> + Send + Sync + 'static,
        T: Serialize,
        E: Into<TaskError>,
    {
        self.spawn_each(items, false, work)
    }

    /// Like [`run_each`](Self::run_each), with the item's index as parameter 1.
    pub fn run_each_with_index<I, V, F, T, E>(&self, items: I, work: F) -> Vec<Task>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
        F: Fn(&TaskContext) -> std::result::Result<T, E> + Send + Sync + 'static,
        T: Serialize,
        E: Into<TaskError>,
    {
        self.spawn_each(items, true, work)
    }

    fn spawn_each<I, V, F, T, E>(&self, items: I, with_index: bool, work: F) -> Vec<Task>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
        F: Fn(&TaskContext) -> std::result::Result<T, E> + Send + Sync + 'static,
        T: Serialize,
        E: Into<TaskError>,
    {
        let work = Arc::new(work);
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let mut options = TaskOptions::new().param(item);
                if with_index {
                    options = options.param(index);
                }
                let work = Arc::clone(&work);
                self.run_with(options, move |ctx: &TaskContext| work(ctx))
            })
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.pending_count()
    }

    pub fn running_count(&self) -> usize {
        self.shared.running_count()
    }

    pub fn parallel_level(&self) -> usize {
        self.shared.parallel_level()
    }

    /// Change the concurrency ceiling for future admissions.
    ///
    /// `0` is ignored and `false` returned; trees already running are not
    /// affected.
    pub fn set_parallel_level(&self, level: usize) -> bool {
        self.shared.set_parallel_level(level)
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            pending: self.pending_count(),
            running: self.running_count(),
            parallel_level: self.parallel_level(),
        }
    }

    /// Cancel every pending task and every running tree.
    ///
    /// Returns the number of pending tasks plus running trees affected.
    pub fn cancel_all(&self) -> usize {
        self.shared.cancel_all()
    }

    /// The runtime hosting the monitor loop and the coordinators.
    pub fn handle(&self) -> &Handle {
        &self.shared.handle
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("stats", &self.stats())
            .field("owns_runtime", &self.runtime.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shared.shutdown();
        if let Some(runtime) = self.runtime.take() {
            // Blocking here would panic when dropped from async code.
            runtime.shutdown_background();
        }
    }
}

/// Builder for a [`Scheduler`] with a custom backend or runtime.
#[derive(Default)]
pub struct SchedulerBuilder {
    config: Option<SchedulerConfig>,
    backend: Option<Arc<dyn WorkerBackend>>,
    handle: Option<Handle>,
}

impl SchedulerBuilder {
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn parallel_level(mut self, level: usize) -> Self {
        let config = self.config.take().unwrap_or_default();
        self.config = Some(config.with_parallel_level(level));
        self
    }

    pub fn backend(mut self, backend: impl WorkerBackend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    pub fn handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn build(self) -> Result<Scheduler> {
        let config = self.config.unwrap_or_default();
        validate_config(&config)?;

        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(ThreadWorkerBackend));

        let (handle, runtime) = match self.handle {
            Some(handle) => (handle, None),
            None => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(config.worker_threads)
                    .thread_name(config.thread_name.clone())
                    .enable_all()
                    .build()
                    .map_err(|e| RtaskError::Runtime(e.to_string()))?;
                (runtime.handle().clone(), Some(runtime))
            }
        };

        info!(
            parallel_level = config.parallel_level,
            owns_runtime = runtime.is_some(),
            "scheduler created"
        );

        Ok(Scheduler {
            shared: Arc::new(Shared::new(config.parallel_level, backend, handle)),
            runtime,
        })
    }
}
