// src/wait.rs

//! Blocking waits on one or more tasks.
//!
//! Waiters register a [`Signal`] on every task they watch; each terminal
//! transition bumps it. Nothing here polls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::sync::Signal;
use crate::task::Task;

/// How long a blocking wait may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// Wait until the condition holds.
    #[default]
    Infinite,
    /// Give up after this long. A zero duration checks once.
    After(Duration),
}

impl Timeout {
    pub fn from_millis(millis: u64) -> Self {
        Timeout::After(Duration::from_millis(millis))
    }

    fn deadline(self) -> Option<Instant> {
        match self {
            Timeout::Infinite => None,
            // Too far out to represent is as good as forever.
            Timeout::After(duration) => Instant::now().checked_add(duration),
        }
    }
}

/// Milliseconds; any negative value means "wait indefinitely".
impl From<i64> for Timeout {
    fn from(millis: i64) -> Self {
        match u64::try_from(millis) {
            Ok(millis) => Timeout::from_millis(millis),
            Err(_) => Timeout::Infinite,
        }
    }
}

impl From<i32> for Timeout {
    fn from(millis: i32) -> Self {
        Timeout::from(i64::from(millis))
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Timeout::After(duration)
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(duration: Option<Duration>) -> Self {
        duration.map_or(Timeout::Infinite, Timeout::After)
    }
}

/// Block until every task in `tasks` is finished.
///
/// Returns `false` if `timeout` elapsed first. The tasks keep running either
/// way.
pub fn wait_all(tasks: &[Task], timeout: impl Into<Timeout>) -> bool {
    wait_until(tasks, timeout.into(), |tasks| {
        tasks.iter().all(Task::is_finished).then_some(())
    })
    .is_some()
}

/// Block until any task in `tasks` is finished and return the first one
/// found, in slice order.
///
/// Returns `None` if `tasks` is empty or `timeout` elapsed first.
pub fn wait_any(tasks: &[Task], timeout: impl Into<Timeout>) -> Option<Task> {
    if tasks.is_empty() {
        return None;
    }
    wait_until(tasks, timeout.into(), |tasks| {
        tasks.iter().find(|task| task.is_finished()).cloned()
    })
}

fn wait_until<R>(
    tasks: &[Task],
    timeout: Timeout,
    check: impl Fn(&[Task]) -> Option<R>,
) -> Option<R> {
    let deadline = timeout.deadline();
    let signal = Arc::new(Signal::new());
    for task in tasks {
        task.add_watcher(&signal);
    }

    loop {
        let seen = signal.generation();
        if let Some(found) = check(tasks) {
            return Some(found);
        }
        if !signal.wait_past(seen, deadline) {
            return check(tasks);
        }
    }
}
