// src/config/validate.rs

use crate::config::model::{RawConfigFile, SchedulerConfig};
use crate::errors::{Result, RtaskError};

impl TryFrom<RawConfigFile> for SchedulerConfig {
    type Error = RtaskError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let defaults = SchedulerConfig::default();
        let config = SchedulerConfig {
            parallel_level: raw
                .scheduler
                .parallel_level
                .unwrap_or(defaults.parallel_level),
            worker_threads: raw
                .runtime
                .worker_threads
                .unwrap_or(defaults.worker_threads),
            thread_name: raw.runtime.thread_name.unwrap_or(defaults.thread_name),
        };
        validate_config(&config)?;
        Ok(config)
    }
}

/// Check a config before a scheduler is built from it.
pub fn validate_config(config: &SchedulerConfig) -> Result<()> {
    if config.parallel_level == 0 {
        return Err(RtaskError::ConfigError(
            "[scheduler].parallel_level must be >= 1 (got 0)".to_string(),
        ));
    }

    if config.worker_threads == 0 {
        return Err(RtaskError::ConfigError(
            "[runtime].worker_threads must be >= 1 (got 0)".to_string(),
        ));
    }

    if config.thread_name.trim().is_empty() {
        return Err(RtaskError::ConfigError(
            "[runtime].thread_name must not be empty".to_string(),
        ));
    }

    Ok(())
}
