// src/task/context.rs

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::TaskError;
use crate::exec::{WorkerHandle, WorkerId};

use super::Task;

/// What a task's work sees while it runs.
pub struct TaskContext {
    task: Task,
    antecedent: Option<Task>,
    worker: Arc<WorkerHandle>,
}

impl TaskContext {
    pub(crate) fn new(task: Task, antecedent: Option<Task>, worker: Arc<WorkerHandle>) -> Self {
        Self {
            task,
            antecedent,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// The task being executed.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Bound positional parameters, in the order they were given.
    pub fn params(&self) -> &[Value] {
        self.task.params()
    }

    pub fn param(&self, index: usize) -> Option<&Value> {
        self.task.params().get(index)
    }

    /// Deserialize parameter `index` into `T`.
    pub fn param_as<T: DeserializeOwned>(&self, index: usize) -> Result<T, TaskError> {
        let value = self
            .param(index)
            .ok_or_else(|| TaskError::new(format!("missing parameter {index}")))?;
        Ok(T::deserialize(value)?)
    }

    /// For a continuation, the task it continues from.
    pub fn antecedent(&self) -> Option<&Task> {
        self.antecedent.as_ref()
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker.id()
    }

    /// `true` once cancellation of this task's tree was requested.
    ///
    /// Long-running work should check this and return early.
    pub fn is_cancelled(&self) -> bool {
        self.worker.is_cancelled()
    }
}
