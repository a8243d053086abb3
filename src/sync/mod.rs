// src/sync/mod.rs

//! Small synchronisation primitives shared by tasks, workers and waiters.
//!
//! - [`signal`] wakes blocking waiters when a task reaches a terminal status.
//! - [`cancel`] carries a cancellation request from the caller to a worker
//!   and to the coordinator consuming that worker's outcomes.

pub mod cancel;
pub mod signal;

pub use cancel::CancelToken;
pub use signal::Signal;
