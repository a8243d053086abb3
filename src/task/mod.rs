// src/task/mod.rs

//! The task record: one unit of work plus its lifecycle.
//!
//! - [`status`] is the lifecycle enumeration.
//! - [`state`] holds the mutable fields and the transition rules.
//! - [`context`] is what running work gets to see.
//! - [`tree`] linearises a task and its continuations for one worker.
//!
//! A [`Task`] is a cheap handle (`Arc`); clones refer to the same record and
//! compare equal.

pub mod context;
pub mod state;
pub mod status;
pub(crate) mod tree;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::errors::{FaultKind, TaskError};
use crate::exec::{Outcome, WorkerHandle, WorkerId};
use crate::scheduler::{Scheduler, SchedulerRef};
use crate::sync::Signal;
use crate::wait::{self, Timeout};

pub use context::TaskContext;
pub use state::Attachment;
pub use status::TaskStatus;

use state::{Callback, Continuation, Settled, TaskState};

/// Type-erased work: the user's closure with its return value already
/// converted into a [`Value`].
pub(crate) type Work = Arc<dyn Fn(&TaskContext) -> Result<Value, TaskError> + Send + Sync>;

/// Process-unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Construction options: a name and bound positional parameters.
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    name: Option<String>,
    params: Vec<Value>,
}

impl TaskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn params<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.params.extend(values.into_iter().map(Into::into));
        self
    }
}

struct TaskInner {
    id: TaskId,
    name: String,
    params: Vec<Value>,
    work: Option<Work>,
    state: Mutex<TaskState>,
    done: Notify,
}

/// A unit of asynchronous work.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    /// Create a task in `Created` status. Nothing runs until it is started.
    pub fn new<F, T, E>(work: F) -> Self
    where
        F: Fn(&TaskContext) -> Result<T, E> + Send + Sync + 'static,
        T: Serialize,
        E: Into<TaskError>,
    {
        Self::with_options(TaskOptions::default(), work)
    }

    pub fn with_options<F, T, E>(options: TaskOptions, work: F) -> Self
    where
        F: Fn(&TaskContext) -> Result<T, E> + Send + Sync + 'static,
        T: Serialize,
        E: Into<TaskError>,
    {
        Self::build(options, Some(erase(work)), TaskState::new(None))
    }

    /// A task that is already `Completed` with `value`.
    ///
    /// `null` is stored as "no result".
    pub fn from_result(value: impl Into<Value>) -> Self {
        let value = value.into();
        let result = (!value.is_null()).then_some(value);
        Self::resolved(TaskState::resolved(TaskStatus::Completed, result, None))
    }

    /// A task that is already `Faulted` with `error`.
    pub fn from_exception(error: impl Into<TaskError>) -> Self {
        Self::resolved(TaskState::resolved(
            TaskStatus::Faulted,
            None,
            Some(error.into()),
        ))
    }

    /// A task that is already `Canceled`.
    pub fn from_canceled() -> Self {
        Self::resolved(TaskState::resolved(TaskStatus::Canceled, None, None))
    }

    fn resolved(state: TaskState) -> Self {
        Self::build(TaskOptions::default(), None, state)
    }

    fn build(options: TaskOptions, work: Option<Work>, state: TaskState) -> Self {
        let id = TaskId::next();
        let name = options.name.unwrap_or_else(|| format!("task {id}"));
        Self {
            inner: Arc::new(TaskInner {
                id,
                name,
                params: options.params,
                work,
                state: Mutex::new(state),
                done: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn params(&self) -> &[Value] {
        &self.inner.params
    }

    pub fn status(&self) -> TaskStatus {
        self.lock_state().status
    }

    pub fn is_completed(&self) -> bool {
        self.status() == TaskStatus::Completed
    }

    pub fn is_faulted(&self) -> bool {
        self.status() == TaskStatus::Faulted
    }

    pub fn is_canceled(&self) -> bool {
        self.status() == TaskStatus::Canceled
    }

    /// Completed, faulted or canceled.
    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// The exception captured when the work failed.
    pub fn exception(&self) -> Option<TaskError> {
        self.lock_state().exception.clone()
    }

    /// The worker that executes (or executed) this task.
    pub fn worker_id(&self) -> Option<WorkerId> {
        self.lock_state().worker.as_ref().map(|w| w.id())
    }

    /// Block until the task finishes or `timeout` elapses, then return the
    /// stored result.
    ///
    /// Returns `None` for work without a result, on timeout, and for tasks
    /// that never completed. A timeout does not cancel the task.
    pub fn result(&self, timeout: impl Into<Timeout>) -> Option<Value> {
        self.wait(timeout);
        self.lock_state().result.clone()
    }

    /// Like [`result`](Self::result), deserialized into `T`.
    pub fn result_as<T: DeserializeOwned>(&self, timeout: impl Into<Timeout>) -> Option<T> {
        self.result(timeout)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Block until the task is finished. Returns `false` on timeout.
    pub fn wait(&self, timeout: impl Into<Timeout>) -> bool {
        wait::wait_all(std::slice::from_ref(self), timeout)
    }

    /// Resolves once the task reaches a terminal status.
    pub async fn finished(&self) {
        loop {
            let notified = self.inner.done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_finished() {
                return;
            }
            notified.await;
        }
    }

    /// Submit to the scheduler this task was last submitted to, or to the
    /// global scheduler.
    ///
    /// Starting a task twice queues it twice; guarding against that is up to
    /// the caller.
    pub fn start(&self) {
        let scheduler = self.lock_state().scheduler.clone();
        match scheduler {
            Some(scheduler) => scheduler.submit(self),
            None => Scheduler::global().submit(self),
        }
    }

    pub fn start_on(&self, scheduler: &Scheduler) {
        scheduler.submit(self);
    }

    /// Register work to run after this task, receiving this task as its
    /// antecedent.
    ///
    /// If this task already completed or faulted (or its tree is already
    /// executing), the continuation is submitted right away as a tree of its
    /// own. Otherwise it runs on this task's worker once this task is done.
    /// Continuations of a cancelled task never run.
    pub fn continue_with<F, T, E>(&self, work: F) -> Task
    where
        F: Fn(&TaskContext) -> Result<T, E> + Send + Sync + 'static,
        T: Serialize,
        E: Into<TaskError>,
    {
        self.continue_with_options(TaskOptions::default(), work)
    }

    pub fn continue_with_options<F, T, E>(&self, options: TaskOptions, work: F) -> Task
    where
        F: Fn(&TaskContext) -> Result<T, E> + Send + Sync + 'static,
        T: Serialize,
        E: Into<TaskError>,
    {
        let child = Self::build(
            options,
            Some(erase(work)),
            TaskState::new(Some(self.clone())),
        );

        let (attachment, scheduler) = {
            let mut state = self.lock_state();
            let attachment = state.attachment_for_new_continuation();
            state.continuations.push(Continuation {
                task: child.clone(),
                attachment,
            });
            (attachment, state.scheduler.clone())
        };

        debug!(
            antecedent = %self.name(),
            task = %child.name(),
            ?attachment,
            "registered continuation"
        );

        if attachment == Attachment::Detached {
            match scheduler {
                Some(scheduler) => scheduler.submit(&child),
                None => Scheduler::global().submit(&child),
            }
        }

        child
    }

    /// Continuations registered on this task, in registration order.
    pub fn continuations(&self) -> Vec<(Task, Attachment)> {
        self.lock_state()
            .continuations
            .iter()
            .map(|c| (c.task.clone(), c.attachment))
            .collect()
    }

    /// This task followed by every continuation its worker would run, in
    /// execution order.
    pub fn flatten(&self) -> Vec<Task> {
        tree::flatten(self).into_iter().map(|e| e.task).collect()
    }

    /// Call `callback` when the task completes.
    ///
    /// If it already completed, `callback` runs right here, once.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: Fn(&Task) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        let fire_now = {
            let mut state = self.lock_state();
            state.on_complete = Some(Arc::clone(&callback));
            state.status == TaskStatus::Completed
        };
        if fire_now {
            self.invoke_callback(&callback);
        }
    }

    /// Call `callback` when the task faults.
    ///
    /// If it already faulted, `callback` runs right here, once.
    pub fn on_fault<F>(&self, callback: F)
    where
        F: Fn(&Task) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        let fire_now = {
            let mut state = self.lock_state();
            state.on_fault = Some(Arc::clone(&callback));
            state.status == TaskStatus::Faulted
        };
        if fire_now {
            self.invoke_callback(&callback);
        }
    }

    /// Cancel the task.
    ///
    /// - Queued or not yet started: removed from the queue, never runs.
    /// - Running: marked `Canceled` at once and its worker is told to stop,
    ///   which also abandons the rest of its tree.
    /// - Already finished: the status is still overwritten with `Canceled`;
    ///   the stored result or exception stays readable.
    pub fn cancel(&self) {
        let (previous, settled, worker, scheduler) = {
            let mut state = self.lock_state();
            let (previous, settled) = state.cancel();
            (
                previous,
                settled,
                state.worker.clone(),
                state.scheduler.clone(),
            )
        };

        info!(task = %self.name(), %previous, "task cancelled");

        if let Some(scheduler) = scheduler {
            scheduler.withdraw(self);
        }

        if previous == TaskStatus::Running {
            if let Some(worker) = worker {
                if worker.cancel() {
                    debug!(task = %self.name(), worker = %worker.id(), "signalled worker to stop");
                }
            }
        }

        self.announce(settled);
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, TaskState> {
        // Transitions never run user code under the lock, so a poisoned
        // guard still holds consistent state.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn mark_pending(&self, scheduler: SchedulerRef) {
        let mut state = self.lock_state();
        if state.status != TaskStatus::Created {
            debug!(task = %self.name(), status = %state.status, "task submitted again");
        }
        state.mark_pending(scheduler);
    }

    pub(crate) fn mark_running(&self) -> bool {
        self.lock_state().mark_running()
    }

    pub(crate) fn settle(&self, outcome: Outcome) {
        let settled = self.lock_state().settle(outcome);
        if let Some(settled) = settled {
            self.announce(settled);
        }
    }

    /// Cancel without touching the queue or the worker; used when a tree is
    /// abandoned as a whole.
    pub(crate) fn abandon(&self) -> bool {
        let settled = self.lock_state().abandon();
        match settled {
            Some(settled) => {
                self.announce(settled);
                true
            }
            None => false,
        }
    }

    pub(crate) fn assign_worker(&self, worker: &Arc<WorkerHandle>) {
        self.lock_state().assign_worker(worker);
    }

    /// Whether a worker has already taken this task's tree.
    pub(crate) fn is_dispatched(&self) -> bool {
        self.lock_state().sealed
    }

    pub(crate) fn antecedent(&self) -> Option<Task> {
        self.lock_state().antecedent.clone()
    }

    pub(crate) fn work(&self) -> Option<&Work> {
        self.inner.work.as_ref()
    }

    pub(crate) fn add_watcher(&self, signal: &Arc<Signal>) {
        self.lock_state().add_watcher(signal);
    }

    fn announce(&self, settled: Settled) {
        self.inner.done.notify_waiters();
        for watcher in &settled.watchers {
            watcher.notify();
        }
        if let Some(callback) = settled.callback {
            self.invoke_callback(&callback);
        }
    }

    fn invoke_callback(&self, callback: &Callback) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(self))) {
            let err = TaskError::from_panic(payload);
            error!(task = %self.name(), error = %err, "task callback panicked");
        }
    }
}

fn erase<F, T, E>(work: F) -> Work
where
    F: Fn(&TaskContext) -> Result<T, E> + Send + Sync + 'static,
    T: Serialize,
    E: Into<TaskError>,
{
    Arc::new(move |ctx: &TaskContext| match work(ctx) {
        Ok(value) => serde_json::to_value(value)
            .map_err(|e| TaskError::with_kind(FaultKind::Unserializable, e.to_string())),
        Err(err) => Err(err.into()),
    })
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Task {}

impl Hash for Task {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
