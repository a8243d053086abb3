// src/scheduler/monitor.rs

//! The admission loop.
//!
//! One loop runs per scheduler, started on first submission. It dispatches
//! while there is both capacity and pending work, and otherwise parks on the
//! scheduler's `Notify` until a submission, a released slot or a ceiling
//! change wakes it. `Notify` keeps a permit for a wake-up that arrives before
//! the loop parks, so none is lost.

use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::exec::coordinator::coordinate;
use crate::exec::{WorkerHandle, WorkerJob};
use crate::task::{Task, tree};

use super::{Admission, SchedulerRef};

pub(crate) async fn monitor_loop(shared: SchedulerRef) {
    info!("monitor loop started");

    loop {
        match shared.admit_next() {
            Admission::Dispatch(task) => dispatch(&shared, task),
            Admission::Idle => {
                trace!("no pending tasks; parking");
                shared.parked().await;
            }
            Admission::Saturated => {
                trace!(
                    running = shared.running_count(),
                    parallel_level = shared.parallel_level(),
                    "at capacity; parking"
                );
                shared.parked().await;
            }
            Admission::Closed => break,
        }
    }

    info!("monitor loop finished (scheduler shut down)");
}

/// Hand `task` and its continuation tree to a fresh worker and spawn the
/// coordinator that consumes the worker's messages.
///
/// The coordinator gets a blocking-pool thread of its own, since it runs user
/// callbacks and those may block on other tasks.
fn dispatch(shared: &SchedulerRef, task: Task) {
    let tree = Arc::new(tree::seal(&task));
    let worker = Arc::new(WorkerHandle::new());
    let job = WorkerJob::new(worker, tree);

    debug!(
        task = %task.name(),
        worker = %job.worker().id(),
        tree_len = job.len(),
        running = shared.running_count(),
        "dispatching task tree"
    );

    shared.track(job.clone());
    let rx = shared.backend().launch(job.clone());
    let shared = Arc::clone(shared);
    let handle = shared.handle.clone();
    tokio::task::spawn_blocking(move || handle.block_on(coordinate(shared, job, rx)));
}
