// src/exec/backend.rs

//! Pluggable worker backend.
//!
//! The scheduler hands every dispatched tree to a `WorkerBackend` and gets
//! back the receiving end of that worker's message stream.
//!
//! - `ThreadWorkerBackend` is the default. It runs the tree on tokio's
//!   blocking pool via [`run_tree`], so user work never stalls the runtime
//!   threads that host the monitor loop and the coordinators.
//! - Tests can wrap it to record what was launched, or replace it entirely
//!   and emit messages themselves.

use tokio::sync::mpsc;

use super::protocol::WorkerMessage;
use super::worker::{WorkerJob, run_tree};

/// Trait abstracting how a dispatched tree is executed.
///
/// `launch` is always called from within the scheduler's tokio runtime.
/// Implementations must send messages for the job's tasks in order and close
/// the channel (drop the sender) when the worker is done.
pub trait WorkerBackend: Send + Sync {
    fn launch(&self, job: WorkerJob) -> mpsc::UnboundedReceiver<WorkerMessage>;
}

/// Runs each tree on its own blocking thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadWorkerBackend;

impl WorkerBackend for ThreadWorkerBackend {
    fn launch(&self, job: WorkerJob) -> mpsc::UnboundedReceiver<WorkerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::task::spawn_blocking(move || run_tree(job, tx));
        rx
    }
}
