// src/config/mod.rs

//! Configuration loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and apply environment overrides
//!   (`loader.rs`).
//! - Validate values before a scheduler is built from them (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    PARALLEL_LEVEL_ENV, apply_env_overrides, default_config_path, load_and_validate,
    load_from_path,
};
pub use model::{RawConfigFile, RuntimeSection, SchedulerConfig, SchedulerSection};
pub use validate::validate_config;
