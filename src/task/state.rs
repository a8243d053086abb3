// src/task/state.rs

//! Mutable per-task state and its transitions.
//!
//! All fields live behind the task's single mutex so that status, result,
//! exception, continuations and callbacks are always observed together. The
//! transition methods never call out to user code; they hand back a
//! [`Settled`] describing who has to be told, and the caller does the telling
//! after the lock is released.

use std::sync::{Arc, Weak};

use serde_json::Value;
use tracing::warn;

use crate::errors::TaskError;
use crate::exec::{Outcome, WorkerHandle};
use crate::scheduler::SchedulerRef;
use crate::sync::Signal;

use super::status::TaskStatus;
use super::Task;

pub(crate) type Callback = Arc<dyn Fn(&Task) + Send + Sync>;

/// How a continuation relates to its antecedent's execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// Registered before the antecedent was dispatched; runs on the same
    /// worker, right after the antecedent's earlier siblings.
    Chained,
    /// Registered after the antecedent finished (or after its tree was
    /// dispatched); submitted as an independent tree with its own worker.
    Detached,
}

#[derive(Clone)]
pub(crate) struct Continuation {
    pub task: Task,
    pub attachment: Attachment,
}

/// Work to do once a transition has been committed.
#[derive(Default)]
pub(crate) struct Settled {
    pub watchers: Vec<Arc<Signal>>,
    pub callback: Option<Callback>,
}

pub(crate) struct TaskState {
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub exception: Option<TaskError>,
    pub worker: Option<Arc<WorkerHandle>>,
    /// Released on the first terminal transition.
    pub antecedent: Option<Task>,
    pub continuations: Vec<Continuation>,
    /// Set once a worker has flattened this task; later continuations are
    /// submitted on their own.
    pub sealed: bool,
    pub on_complete: Option<Callback>,
    pub on_fault: Option<Callback>,
    pub scheduler: Option<SchedulerRef>,
    watchers: Vec<Weak<Signal>>,
}

impl TaskState {
    pub fn new(antecedent: Option<Task>) -> Self {
        Self {
            status: TaskStatus::Created,
            result: None,
            exception: None,
            worker: None,
            antecedent,
            continuations: Vec::new(),
            sealed: false,
            on_complete: None,
            on_fault: None,
            scheduler: None,
            watchers: Vec::new(),
        }
    }

    /// State for a task that is born terminal.
    pub fn resolved(status: TaskStatus, result: Option<Value>, exception: Option<TaskError>) -> Self {
        Self {
            status,
            result,
            exception,
            ..Self::new(None)
        }
    }

    pub fn mark_pending(&mut self, scheduler: SchedulerRef) {
        self.status = TaskStatus::Pending;
        self.scheduler = Some(scheduler);
    }

    /// Returns `false` when the task was cancelled before its worker reached it.
    pub fn mark_running(&mut self) -> bool {
        match self.status {
            TaskStatus::Canceled => false,
            _ => {
                self.status = TaskStatus::Running;
                true
            }
        }
    }

    /// Apply a worker outcome.
    ///
    /// A task that was cancelled while running keeps its `Canceled` status and
    /// gets no result; `None` is returned and nobody is notified.
    pub fn settle(&mut self, outcome: Outcome) -> Option<Settled> {
        if self.status == TaskStatus::Canceled {
            return None;
        }

        let callback = match outcome {
            Outcome::Value(value) => {
                self.status = TaskStatus::Completed;
                self.result = Some(value);
                self.exception = None;
                self.on_complete.clone()
            }
            Outcome::NoResult => {
                self.status = TaskStatus::Completed;
                self.result = None;
                self.exception = None;
                self.on_complete.clone()
            }
            Outcome::Exception(err) => {
                self.status = TaskStatus::Faulted;
                self.result = None;
                self.exception = Some(err);
                self.on_fault.clone()
            }
        };

        self.antecedent = None;
        Some(Settled {
            watchers: self.take_watchers(),
            callback,
        })
    }

    /// Force the status to `Canceled`, whatever it was before.
    ///
    /// Result and exception are left as they are, so cancelling a finished
    /// task keeps the value it already produced.
    pub fn cancel(&mut self) -> (TaskStatus, Settled) {
        let previous = self.status;
        self.status = TaskStatus::Canceled;
        self.antecedent = None;
        (
            previous,
            Settled {
                watchers: self.take_watchers(),
                callback: None,
            },
        )
    }

    /// Cancel only if no terminal status has been reached yet.
    pub fn abandon(&mut self) -> Option<Settled> {
        if self.status.is_terminal() {
            return None;
        }
        Some(self.cancel().1)
    }

    pub fn assign_worker(&mut self, worker: &Arc<WorkerHandle>) {
        match &self.worker {
            None => self.worker = Some(Arc::clone(worker)),
            Some(existing) if existing.id() != worker.id() => {
                warn!(
                    current = %existing.id(),
                    ignored = %worker.id(),
                    "task already bound to a worker; keeping the first one"
                );
            }
            Some(_) => {}
        }
    }

    /// Mark the continuation list as consumed by a worker and return it.
    pub fn seal(&mut self) -> Vec<Task> {
        self.sealed = true;
        self.chained_continuations()
    }

    pub fn chained_continuations(&self) -> Vec<Task> {
        self.continuations
            .iter()
            .filter(|c| c.attachment == Attachment::Chained)
            .map(|c| c.task.clone())
            .collect()
    }

    /// Decide how a new continuation attaches, given the current state.
    pub fn attachment_for_new_continuation(&self) -> Attachment {
        let finished = matches!(self.status, TaskStatus::Completed | TaskStatus::Faulted);
        let dispatched = self.sealed && self.status != TaskStatus::Canceled;
        if finished || dispatched {
            Attachment::Detached
        } else {
            Attachment::Chained
        }
    }

    pub fn add_watcher(&mut self, signal: &Arc<Signal>) {
        self.watchers.retain(|w| w.strong_count() > 0);
        self.watchers.push(Arc::downgrade(signal));
    }

    fn take_watchers(&mut self) -> Vec<Arc<Signal>> {
        self.watchers.drain(..).filter_map(|w| w.upgrade()).collect()
    }
}
