// src/exec/protocol.rs

//! Messages sent from a worker to its coordinator.
//!
//! Messages for one tree arrive in flatten order. Indices refer to positions
//! in that flattened tree.

use serde_json::Value;

use crate::errors::TaskError;

/// Result of running one task's work.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The work returned a value.
    Value(Value),
    /// The work returned normally without a value (`()`, `None`, `null`).
    NoResult,
    /// The work failed.
    Exception(TaskError),
}

impl Outcome {
    pub fn from_value(value: Value) -> Self {
        if value.is_null() {
            Outcome::NoResult
        } else {
            Outcome::Value(value)
        }
    }

    pub fn is_exception(&self) -> bool {
        matches!(self, Outcome::Exception(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    /// The worker is about to invoke the task's work.
    Started { index: usize },
    /// The task's work returned or failed.
    Finished { index: usize, outcome: Outcome },
    /// The worker passed over a task that was cancelled before it was
    /// reached, or whose antecedent in the tree was.
    Skipped { index: usize },
}

impl WorkerMessage {
    pub fn index(&self) -> usize {
        match self {
            WorkerMessage::Started { index }
            | WorkerMessage::Finished { index, .. }
            | WorkerMessage::Skipped { index } => *index,
        }
    }
}
