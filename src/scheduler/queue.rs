// src/scheduler/queue.rs

use std::collections::VecDeque;

use crate::task::Task;

/// FIFO of tasks waiting for a running slot.
///
/// The same task may appear more than once if it was started more than once.
#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
    tasks: VecDeque<Task>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    pub fn pop(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// Remove every queued occurrence of `task`. Returns how many were removed.
    pub fn remove(&mut self, task: &Task) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|queued| queued != task);
        before - self.tasks.len()
    }

    pub fn drain(&mut self) -> Vec<Task> {
        self.tasks.drain(..).collect()
    }
}
