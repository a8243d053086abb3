// src/config/model.rs

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// Configuration file as read from TOML.
///
/// ```toml
/// [scheduler]
/// parallel_level = 4
///
/// [runtime]
/// worker_threads = 2
/// thread_name = "rtask"
/// ```
///
/// Every section and key is optional; missing values fall back to
/// [`SchedulerConfig::default`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub runtime: RuntimeSection,
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulerSection {
    /// Maximum number of task trees running at once.
    pub parallel_level: Option<usize>,
}

/// `[runtime]` section: the tokio runtime an owned scheduler builds for its
/// monitor loop and coordinators. User work does not run on these threads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeSection {
    pub worker_threads: Option<usize>,
    pub thread_name: Option<String>,
}

/// Validated settings a [`Scheduler`](crate::Scheduler) is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerConfig {
    /// Concurrency ceiling. Defaults to the number of logical CPUs.
    pub parallel_level: usize,
    pub worker_threads: usize,
    pub thread_name: String,
}

impl SchedulerConfig {
    /// Defaults overridden by the `PARALLEL_LEVEL` environment variable.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        crate::config::loader::apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        config
    }

    pub fn with_parallel_level(mut self, parallel_level: usize) -> Self {
        self.parallel_level = parallel_level;
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            parallel_level: default_parallel_level(),
            worker_threads: 2,
            thread_name: "rtask".to_string(),
        }
    }
}

pub(crate) fn default_parallel_level() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
