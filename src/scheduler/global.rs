// src/scheduler/global.rs

use std::sync::OnceLock;

use crate::config::SchedulerConfig;

use super::Scheduler;

static GLOBAL: OnceLock<Scheduler> = OnceLock::new();

impl Scheduler {
    /// The process-wide default scheduler, built on first use from
    /// [`SchedulerConfig::from_env`]. It lives until the process exits.
    ///
    /// # Panics
    ///
    /// Panics if its tokio runtime cannot be created, the same way
    /// `#[tokio::main]` does.
    pub fn global() -> &'static Scheduler {
        GLOBAL.get_or_init(|| {
            Scheduler::new(SchedulerConfig::from_env())
                .expect("failed to build the global rtask scheduler")
        })
    }
}
