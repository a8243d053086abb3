// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::model::{RawConfigFile, SchedulerConfig};
use crate::errors::Result;

/// Environment variable that overrides the concurrency ceiling.
pub const PARALLEL_LEVEL_ENV: &str = "PARALLEL_LEVEL";

/// Load a configuration file and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization. Use [`load_and_validate`] to get
/// a usable [`SchedulerConfig`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file, fill in defaults, validate, then apply
/// environment overrides.
///
/// Precedence: defaults < file < environment.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<SchedulerConfig> {
    let raw_config = load_from_path(&path)?;
    let mut config = SchedulerConfig::try_from(raw_config)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    debug!(path = %path.as_ref().display(), ?config, "loaded scheduler config");
    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Unparsable or non-positive values are ignored and the current value kept.
pub fn apply_env_overrides(
    config: &mut SchedulerConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let Some(raw) = lookup(PARALLEL_LEVEL_ENV) else {
        return;
    };

    match raw.trim().parse::<usize>() {
        Ok(level) if level > 0 => config.parallel_level = level,
        _ => warn!(
            var = PARALLEL_LEVEL_ENV,
            value = %raw,
            kept = config.parallel_level,
            "ignoring invalid parallel level override"
        ),
    }
}

/// Default config file location: `Rtask.toml` in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Rtask.toml")
}
