// tests/callbacks.rs

mod common;
use crate::common::{init_tracing, scheduler_with_level, wait_until};

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use rtask::{Scheduler, SchedulerConfig, Task, TaskError};

type TestResult = Result<(), Box<dyn Error>>;

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

#[test]
fn on_complete_fires_once_when_registered_before_start() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(1);
    let fired = counter();

    let task = Task::new(|_ctx| Ok::<_, TaskError>(1));
    let seen = Arc::clone(&fired);
    task.on_complete(move |t| {
        assert!(t.is_completed());
        seen.fetch_add(1, Ordering::SeqCst);
    });
    task.start_on(&scheduler);

    assert!(task.wait(-1));
    assert!(wait_until(
        || fired.load(Ordering::SeqCst) == 1,
        Duration::from_secs(2)
    ));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn on_complete_registered_after_completion_fires_immediately() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(1);
    let fired = counter();

    let task = scheduler.run(|_ctx| Ok::<_, TaskError>("done"));
    assert!(task.wait(-1));

    let seen = Arc::clone(&fired);
    task.on_complete(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn on_fault_fires_for_failures_only() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(1);
    let completed = counter();
    let faulted = counter();

    let task = Task::new(|_ctx| Err::<(), _>(TaskError::from("nope")));
    let c = Arc::clone(&completed);
    task.on_complete(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    let f = Arc::clone(&faulted);
    task.on_fault(move |t| {
        assert_eq!(t.exception().map(|e| e.message().to_string()).as_deref(), Some("nope"));
        f.fetch_add(1, Ordering::SeqCst);
    });
    task.start_on(&scheduler);

    assert!(task.wait(-1));
    assert!(wait_until(
        || faulted.load(Ordering::SeqCst) == 1,
        Duration::from_secs(2)
    ));
    assert_eq!(completed.load(Ordering::SeqCst), 0);

    // Late registration on a faulted task fires at once.
    let late = counter();
    let l = Arc::clone(&late);
    task.on_fault(move |_| {
        l.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(late.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn resolved_tasks_fire_matching_callbacks_immediately() {
    let fired = counter();

    let done = Task::from_result(1);
    let f = Arc::clone(&fired);
    done.on_complete(move |_| {
        f.fetch_add(1, Ordering::SeqCst);
    });
    let f = Arc::clone(&fired);
    done.on_fault(move |_| {
        f.fetch_add(100, Ordering::SeqCst);
    });

    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn panicking_callback_does_not_break_the_scheduler() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(1);

    let task = Task::new(|_ctx| Ok::<_, TaskError>(1));
    task.on_complete(|_| panic!("callback exploded"));
    task.start_on(&scheduler);
    assert!(task.wait(-1));
    assert!(task.is_completed());

    let next = scheduler.run(|_ctx| Ok::<_, TaskError>(2));
    assert_eq!(next.result_as::<i64>(5_000), Some(2));
    Ok(())
}

#[test]
fn callbacks_may_block_on_other_tasks() -> TestResult {
    init_tracing();
    let config = SchedulerConfig {
        worker_threads: 2,
        ..SchedulerConfig::default().with_parallel_level(8)
    };
    let scheduler = Scheduler::new(config)?;
    let seen: Arc<Mutex<Vec<Option<i64>>>> = Arc::default();

    let slow = scheduler.run(|_ctx| {
        thread::sleep(Duration::from_millis(200));
        Ok::<_, TaskError>(7)
    });

    for _ in 0..6 {
        let quick = Task::new(|_ctx| Ok::<_, TaskError>(0));
        let slow = slow.clone();
        let seen = Arc::clone(&seen);
        quick.on_complete(move |_| {
            let value = slow.result_as::<i64>(5_000);
            seen.lock().unwrap().push(value);
        });
        quick.start_on(&scheduler);
    }

    assert!(wait_until(
        || seen.lock().unwrap().len() == 6,
        Duration::from_secs(10)
    ));
    assert!(seen.lock().unwrap().iter().all(|v| *v == Some(7)));
    Ok(())
}
