// tests/cancel_behaviour.rs

mod common;
use crate::common::{init_tracing, scheduler_with_level, wait_until};

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rtask::{Task, TaskContext, TaskError, TaskStatus, wait_all};

type TestResult = Result<(), Box<dyn Error>>;

/// Work that spins until its tree is cancelled (or five seconds pass) and
/// records that it noticed.
fn until_cancelled(noticed: Arc<AtomicBool>) -> impl Fn(&TaskContext) -> Result<(), TaskError> {
    move |ctx: &TaskContext| {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if ctx.is_cancelled() {
                noticed.store(true, Ordering::SeqCst);
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }
}

#[test]
fn cancelling_a_pending_task_removes_it_from_the_queue() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(1);
    let ran = Arc::new(AtomicBool::new(false));

    let blocker = scheduler.run(|_ctx| {
        thread::sleep(Duration::from_millis(150));
        Ok::<_, TaskError>(())
    });
    let flag = Arc::clone(&ran);
    let queued = scheduler.run(move |_ctx| {
        flag.store(true, Ordering::SeqCst);
        Ok::<_, TaskError>(())
    });

    assert!(wait_until(
        || blocker.status() == TaskStatus::Running,
        Duration::from_secs(2)
    ));
    assert_eq!(queued.status(), TaskStatus::Pending);
    assert_eq!(scheduler.pending_count(), 1);

    queued.cancel();
    assert_eq!(queued.status(), TaskStatus::Canceled);
    assert_eq!(scheduler.pending_count(), 0);
    assert!(queued.wait(0));

    assert!(blocker.wait(-1));
    thread::sleep(Duration::from_millis(50));
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(queued.status(), TaskStatus::Canceled);
    Ok(())
}

#[test]
fn cancelling_a_running_task_signals_its_worker_and_frees_the_slot() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(1);
    let noticed = Arc::new(AtomicBool::new(false));

    let task = scheduler.run(until_cancelled(Arc::clone(&noticed)));
    assert!(wait_until(
        || task.status() == TaskStatus::Running,
        Duration::from_secs(2)
    ));

    task.cancel();
    assert_eq!(task.status(), TaskStatus::Canceled);
    assert!(task.wait(0));

    assert!(wait_until(
        || noticed.load(Ordering::SeqCst),
        Duration::from_secs(2)
    ));
    assert!(wait_until(
        || scheduler.running_count() == 0,
        Duration::from_secs(2)
    ));

    // The late outcome from the worker does not overwrite the cancellation.
    thread::sleep(Duration::from_millis(30));
    assert_eq!(task.status(), TaskStatus::Canceled);

    let next = scheduler.run(|_ctx| Ok::<_, TaskError>(3));
    assert_eq!(next.result_as::<i64>(5_000), Some(3));
    Ok(())
}

#[test]
fn cancelling_a_running_root_abandons_its_continuations() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(1);
    let noticed = Arc::new(AtomicBool::new(false));
    let continued = Arc::new(AtomicBool::new(false));

    let root = Task::new(until_cancelled(Arc::clone(&noticed)));
    let flag = Arc::clone(&continued);
    let next = root.continue_with(move |_ctx| {
        flag.store(true, Ordering::SeqCst);
        Ok::<_, TaskError>(())
    });
    root.start_on(&scheduler);

    assert!(wait_until(
        || root.status() == TaskStatus::Running,
        Duration::from_secs(2)
    ));
    root.cancel();

    assert!(next.wait(2_000));
    assert_eq!(next.status(), TaskStatus::Canceled);
    assert!(wait_until(
        || noticed.load(Ordering::SeqCst),
        Duration::from_secs(2)
    ));
    thread::sleep(Duration::from_millis(30));
    assert!(!continued.load(Ordering::SeqCst));
    Ok(())
}

#[test]
fn cancelling_a_finished_task_overwrites_the_status_but_keeps_the_result() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(1);

    let task = scheduler.run(|_ctx| Ok::<_, TaskError>(5));
    assert!(task.wait(-1));
    assert!(task.is_completed());

    task.cancel();
    assert_eq!(task.status(), TaskStatus::Canceled);
    assert_eq!(task.result_as::<i64>(0), Some(5));
    Ok(())
}

#[test]
fn cancelling_an_unstarted_task_makes_it_terminal() {
    let task = Task::new(|_ctx| Ok::<_, TaskError>(()));
    task.cancel();
    assert!(task.is_canceled());
    assert!(task.wait(0));
}

#[test]
fn cancelled_chained_continuation_and_its_subtree_are_skipped() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(1);
    let runs = Arc::new(AtomicUsize::new(0));

    let counting = |runs: &Arc<AtomicUsize>| {
        let runs = Arc::clone(runs);
        move |_ctx: &TaskContext| {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok::<_, TaskError>(())
        }
    };

    let root = Task::new(counting(&runs));
    let skipped = root.continue_with(counting(&runs));
    let below = skipped.continue_with(counting(&runs));
    let sibling = root.continue_with(counting(&runs));

    skipped.cancel();
    root.start_on(&scheduler);

    assert!(wait_all(&[root.clone(), skipped.clone(), below.clone(), sibling.clone()], 5_000));
    assert!(root.is_completed());
    assert!(sibling.is_completed());
    assert!(skipped.is_canceled());
    assert!(below.is_canceled());
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn cancel_all_clears_queued_and_running_work() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(1);
    let noticed = Arc::new(AtomicBool::new(false));

    let running = scheduler.run(until_cancelled(Arc::clone(&noticed)));
    assert!(wait_until(
        || running.status() == TaskStatus::Running,
        Duration::from_secs(2)
    ));
    let queued: Vec<Task> = (0..3)
        .map(|_| scheduler.run(|_ctx| Ok::<_, TaskError>(())))
        .collect();

    assert_eq!(scheduler.cancel_all(), 4);
    assert!(running.is_canceled());
    assert!(queued.iter().all(Task::is_canceled));
    assert_eq!(scheduler.pending_count(), 0);
    assert!(wait_until(
        || scheduler.running_count() == 0,
        Duration::from_secs(2)
    ));
    assert!(wait_until(
        || noticed.load(Ordering::SeqCst),
        Duration::from_secs(2)
    ));
    Ok(())
}
