use std::sync::{Arc, Mutex};

use rtask::exec::{ThreadWorkerBackend, WorkerBackend, WorkerJob, WorkerMessage};
use rtask::WorkerId;
use tokio::sync::mpsc;

/// One dispatched tree as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub worker: WorkerId,
    /// Task names in execution order.
    pub tasks: Vec<String>,
}

/// A backend that:
/// - records every tree it is asked to run
/// - delegates the actual execution to `ThreadWorkerBackend`.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    launches: Arc<Mutex<Vec<Launch>>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of the launches; stays valid after the backend is moved
    /// into a scheduler.
    pub fn launches(&self) -> Arc<Mutex<Vec<Launch>>> {
        Arc::clone(&self.launches)
    }
}

impl WorkerBackend for RecordingBackend {
    fn launch(&self, job: WorkerJob) -> mpsc::UnboundedReceiver<WorkerMessage> {
        let launch = Launch {
            worker: job.worker().id(),
            tasks: job.tasks().map(|t| t.name().to_string()).collect(),
        };
        tracing::debug!(worker = %launch.worker, tasks = ?launch.tasks, "recording launched tree");
        self.launches.lock().unwrap().push(launch);
        ThreadWorkerBackend.launch(job)
    }
}
