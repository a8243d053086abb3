// src/exec/coordinator.rs

//! Host side of the execution protocol.
//!
//! One coordinator runs per dispatched tree. It is the only writer of the
//! tree's status/result/exception fields, fires the registered callbacks in
//! message order, and gives the running slot back to the scheduler when the
//! stream ends or the tree is cancelled.
//!
//! Callbacks run on the coordinator's thread, a blocking-pool thread held for
//! the lifetime of the tree, so a callback that waits on another task does
//! not stall the runtime's async workers.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::scheduler::SchedulerRef;

use super::protocol::WorkerMessage;
use super::worker::WorkerJob;

pub(crate) async fn coordinate(
    scheduler: SchedulerRef,
    job: WorkerJob,
    mut rx: mpsc::UnboundedReceiver<WorkerMessage>,
) {
    let worker = Arc::clone(job.worker());

    let aborted = loop {
        tokio::select! {
            biased;

            message = rx.recv() => match message {
                Some(message) => apply(&job, message),
                None => break false,
            },

            _ = worker.cancelled() => break true,
        }
    };

    // Anything the worker still sends is dropped on its side.
    drop(rx);

    if aborted {
        let abandoned = job.tasks().filter(|task| task.abandon()).count();
        debug!(worker = %worker.id(), abandoned, "tree cancelled; remaining tasks marked canceled");
    } else {
        for task in job.tasks().filter(|task| !task.is_finished()) {
            warn!(
                worker = %worker.id(),
                task = %task.name(),
                status = %task.status(),
                "worker stream ended without an outcome for task"
            );
        }
    }

    scheduler.release(worker.id());
}

fn apply(job: &WorkerJob, message: WorkerMessage) {
    let index = message.index();
    let Some(task) = job.task(index) else {
        warn!(worker = %job.worker().id(), index, "message for unknown tree index; ignoring");
        return;
    };

    match message {
        WorkerMessage::Started { .. } => {
            if !task.mark_running() {
                debug!(task = %task.name(), "task started after cancellation; status kept");
            }
        }
        WorkerMessage::Finished { outcome, .. } => {
            debug!(
                worker = %job.worker().id(),
                task = %task.name(),
                index,
                failed = outcome.is_exception(),
                "task outcome received"
            );
            task.settle(outcome);
        }
        WorkerMessage::Skipped { .. } => {
            task.abandon();
        }
    }
}
