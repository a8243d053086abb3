#![allow(dead_code, unused_imports)]

pub use rtask_test_utils::recording_backend;
pub use rtask_test_utils::{init_tracing, scheduler_with_level, wait_until};
