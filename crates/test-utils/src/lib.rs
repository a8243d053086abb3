pub mod recording_backend;

use std::sync::Once;
use std::time::{Duration, Instant};

use rtask::{Scheduler, SchedulerConfig};
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// A scheduler with its own runtime and the given ceiling.
///
/// Uses four runtime threads so coordinators never starve behind slow work.
pub fn scheduler_with_level(level: usize) -> Scheduler {
    let config = SchedulerConfig {
        worker_threads: 4,
        ..SchedulerConfig::default()
    }
    .with_parallel_level(level);

    Scheduler::new(config).expect("failed to build test scheduler")
}

/// Poll `cond` every few milliseconds until it holds or `timeout` passes.
///
/// For conditions the crate offers no way to wait on, such as "this task has
/// started running".
pub fn wait_until(cond: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}
