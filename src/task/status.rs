// src/task/status.rs

use std::fmt;

use serde::Serialize;

/// Lifecycle of a task.
///
/// `Created -> Pending -> Running -> {Completed | Faulted | Canceled}`.
/// Cancellation can also be entered directly from `Created` and `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// The task has been constructed but not yet submitted.
    Created,
    /// The task is queued for admission.
    Pending,
    /// The task's work is executing on a worker.
    Running,
    /// The work returned normally.
    Completed,
    /// The work returned an error or panicked.
    Faulted,
    /// The task was cancelled.
    Canceled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Faulted | TaskStatus::Canceled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Created => "created",
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Faulted => "faulted",
            TaskStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}
