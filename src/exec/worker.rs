// src/exec/worker.rs

//! Worker side of the execution protocol.
//!
//! A worker receives one flattened tree and runs it front to back. Each
//! task's work is invoked under `catch_unwind`, so an error or a panic in user
//! code becomes an `Outcome::Exception` for that task and the worker moves on
//! to the next entry. Sends to a coordinator that has gone away are dropped.
//!
//! A continuation whose antecedent is part of a dispatched tree only starts
//! once that antecedent is terminal, and is skipped if it was cancelled. The
//! coordinator always settles or abandons every task of its tree, so that
//! wait ends. A continuation started on its own, before its antecedent was
//! ever dispatched, runs immediately.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::errors::TaskError;
use crate::sync::CancelToken;
use crate::task::tree::TreeEntry;
use crate::task::{Task, TaskContext, TaskStatus};
use crate::wait::Timeout;

use super::protocol::{Outcome, WorkerMessage};

/// Process-unique worker identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WorkerId(u64);

impl WorkerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        WorkerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Identity and stop switch of one worker, recorded on every task it runs.
#[derive(Debug)]
pub struct WorkerHandle {
    id: WorkerId,
    cancel: CancelToken,
}

impl WorkerHandle {
    pub(crate) fn new() -> Self {
        Self {
            id: WorkerId::next(),
            cancel: CancelToken::new(),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Ask the worker to stop. Returns `true` on the first request.
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// A flattened tree bound to the worker that will run it.
#[derive(Clone)]
pub struct WorkerJob {
    worker: Arc<WorkerHandle>,
    tree: Arc<Vec<TreeEntry>>,
}

impl WorkerJob {
    pub(crate) fn new(worker: Arc<WorkerHandle>, tree: Arc<Vec<TreeEntry>>) -> Self {
        Self { worker, tree }
    }

    pub fn worker(&self) -> &Arc<WorkerHandle> {
        &self.worker
    }

    /// The task the tree was dispatched for.
    pub fn root(&self) -> &Task {
        &self.tree[0].task
    }

    pub fn task(&self, index: usize) -> Option<&Task> {
        self.tree.get(index).map(|entry| &entry.task)
    }

    /// Tasks in execution order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tree.iter().map(|entry| &entry.task)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

/// Run every task of `job` in order, streaming messages to `tx`.
///
/// This blocks the calling thread for as long as the work runs.
pub fn run_tree(job: WorkerJob, tx: mpsc::UnboundedSender<WorkerMessage>) {
    let worker = &job.worker;

    // Bind the whole tree first so cancelling any of its tasks finds us.
    for entry in job.tree.iter() {
        entry.task.assign_worker(worker);
    }

    debug!(worker = %worker.id(), root = %job.root().name(), tasks = job.len(), "worker started");

    let mut skipped = vec![false; job.tree.len()];

    for (index, entry) in job.tree.iter().enumerate() {
        if worker.is_cancelled() {
            debug!(worker = %worker.id(), index, "worker cancelled; abandoning the rest of the tree");
            break;
        }

        let parent_skipped = entry.parent.is_some_and(|parent| skipped[parent]);
        if parent_skipped || entry.task.status() == TaskStatus::Canceled {
            skip(&tx, worker, entry, index, &mut skipped);
            continue;
        }

        let _ = tx.send(WorkerMessage::Started { index });

        let upstream_cancelled = match entry.parent {
            Some(parent) => antecedent_cancelled(&job.tree[parent].task),
            // A detached continuation may be admitted while its
            // antecedent's own tree is still running.
            None => entry
                .task
                .antecedent()
                .is_some_and(|antecedent| antecedent_cancelled(&antecedent)),
        };

        if worker.is_cancelled() {
            debug!(worker = %worker.id(), index, "worker cancelled; abandoning the rest of the tree");
            break;
        }

        if upstream_cancelled || entry.task.status() == TaskStatus::Canceled {
            skip(&tx, worker, entry, index, &mut skipped);
            continue;
        }

        let outcome = execute(&entry.task, worker);
        trace!(
            worker = %worker.id(),
            task = %entry.task.name(),
            index,
            failed = outcome.is_exception(),
            "task executed"
        );
        let _ = tx.send(WorkerMessage::Finished { index, outcome });
    }

    debug!(worker = %worker.id(), "worker finished");
}

fn skip(
    tx: &mpsc::UnboundedSender<WorkerMessage>,
    worker: &WorkerHandle,
    entry: &TreeEntry,
    index: usize,
    skipped: &mut [bool],
) {
    skipped[index] = true;
    trace!(worker = %worker.id(), task = %entry.task.name(), index, "skipping cancelled task");
    let _ = tx.send(WorkerMessage::Skipped { index });
}

/// `true` if `antecedent` ended up cancelled.
///
/// Waits only for an antecedent whose tree was dispatched: its coordinator
/// is bound to settle or abandon it. An antecedent that was never submitted
/// is not waited for, so a continuation started on its own runs right away.
fn antecedent_cancelled(antecedent: &Task) -> bool {
    if antecedent.is_dispatched() {
        antecedent.wait(Timeout::Infinite);
    }
    antecedent.is_canceled()
}

fn execute(task: &Task, worker: &Arc<WorkerHandle>) -> Outcome {
    let Some(work) = task.work() else {
        return Outcome::Exception(TaskError::new(format!(
            "task '{}' has no work to run",
            task.name()
        )));
    };

    let ctx = TaskContext::new(task.clone(), task.antecedent(), Arc::clone(worker));

    match panic::catch_unwind(AssertUnwindSafe(|| work(&ctx))) {
        Ok(Ok(value)) => Outcome::from_value(value),
        Ok(Err(err)) => Outcome::Exception(err),
        Err(payload) => Outcome::Exception(TaskError::from_panic(payload)),
    }
}
