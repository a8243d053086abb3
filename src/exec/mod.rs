// src/exec/mod.rs

//! Execution layer.
//!
//! A dispatched task tree runs on one worker, which streams one message per
//! task back to a coordinator on the scheduler's runtime.
//!
//! - [`protocol`] defines the messages crossing the worker boundary.
//! - [`worker`] runs a flattened tree and owns worker identity/cancellation.
//! - [`backend`] provides the `WorkerBackend` trait and the production
//!   `ThreadWorkerBackend`; tests can wrap or replace it.
//! - [`coordinator`] consumes the stream and applies it to the task records.

pub mod backend;
pub(crate) mod coordinator;
pub mod protocol;
pub mod worker;

pub use backend::{ThreadWorkerBackend, WorkerBackend};
pub use protocol::{Outcome, WorkerMessage};
pub use worker::{WorkerHandle, WorkerId, WorkerJob};
