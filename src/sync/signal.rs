// src/sync/signal.rs

//! Generation-counted wake-up signal for blocking waiters.
//!
//! A waiter reads the current generation, checks the condition it cares
//! about, and only then blocks until the generation moves past the value it
//! read. A notification that lands between the check and the block bumps the
//! generation, so it is never lost.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

#[derive(Debug, Default)]
pub struct Signal {
    generation: Mutex<u64>,
    cond: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        *self.lock()
    }

    pub fn notify(&self) {
        let mut generation = self.lock();
        *generation = generation.wrapping_add(1);
        self.cond.notify_all();
    }

    /// Block until the generation differs from `seen` or `deadline` passes.
    ///
    /// Returns `false` on timeout.
    pub fn wait_past(&self, seen: u64, deadline: Option<Instant>) -> bool {
        let mut generation = self.lock();
        while *generation == seen {
            match deadline {
                None => {
                    generation = self
                        .cond
                        .wait(generation)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    let (guard, _timeout) = self
                        .cond
                        .wait_timeout(generation, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    generation = guard;
                }
            }
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        // The guarded value is a plain counter; a poisoned lock is still usable.
        self.generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
