// tests/task_lifecycle.rs

mod common;
use crate::common::{init_tracing, scheduler_with_level, wait_until};

use std::error::Error;
use std::thread;
use std::time::Duration;

use rtask::{FaultKind, Task, TaskContext, TaskError, TaskOptions, TaskStatus, Timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn returning_a_value_completes_with_that_result() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(2);

    let task = scheduler.run(|_ctx| Ok::<_, TaskError>(42));

    assert_eq!(task.result_as::<i64>(-1), Some(42));
    assert_eq!(task.status(), TaskStatus::Completed);
    assert!(task.is_completed());
    assert!(task.exception().is_none());
    Ok(())
}

#[test]
fn returning_nothing_completes_without_a_result() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(2);

    let task = scheduler.run(|_ctx| Ok::<_, TaskError>(()));

    assert!(task.wait(-1));
    assert_eq!(task.status(), TaskStatus::Completed);
    assert_eq!(task.result(0), None);

    let empty = scheduler.run(|_ctx| Ok::<Option<String>, TaskError>(None));
    assert!(empty.wait(-1));
    assert!(empty.is_completed());
    assert_eq!(empty.result(0), None);
    Ok(())
}

#[test]
fn returning_an_error_faults_the_task() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(2);

    let task = scheduler.run(|_ctx| Err::<(), _>(TaskError::from("x")));

    assert!(task.wait(-1));
    assert_eq!(task.status(), TaskStatus::Faulted);
    assert!(task.is_faulted());
    assert_eq!(task.result(0), None);

    let err = task.exception().ok_or("faulted task has no exception")?;
    assert_eq!(err.message(), "x");
    assert_eq!(err.kind(), FaultKind::Raised);
    Ok(())
}

#[test]
fn panicking_work_faults_the_task_and_the_worker_survives() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(1);

    let task = scheduler.run(|_ctx| -> Result<(), TaskError> { panic!("boom") });
    let after = scheduler.run(|_ctx| Ok::<_, TaskError>("still running"));

    assert!(task.wait(-1));
    let err = task.exception().ok_or("panicked task has no exception")?;
    assert_eq!(err.kind(), FaultKind::Panicked);
    assert_eq!(err.message(), "boom");

    assert_eq!(after.result_as::<String>(-1).as_deref(), Some("still running"));
    Ok(())
}

#[test]
fn anyhow_errors_keep_their_context() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(1);

    let task = scheduler.run(|_ctx| -> Result<(), TaskError> {
        let inner = anyhow::anyhow!("disk full");
        Err(inner.context("writing report").into())
    });

    assert!(task.wait(-1));
    let err = task.exception().ok_or("missing exception")?;
    assert_eq!(err.message(), "writing report: disk full");
    Ok(())
}

#[test]
fn bound_parameters_reach_the_work() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(2);

    let options = TaskOptions::new().name("adder").params([20, 22]);
    let task = scheduler.run_with(options, |ctx: &TaskContext| {
        Ok::<_, TaskError>(ctx.param_as::<i64>(0)? + ctx.param_as::<i64>(1)?)
    });

    assert_eq!(task.name(), "adder");
    assert_eq!(task.params().len(), 2);
    assert_eq!(task.result_as::<i64>(-1), Some(42));

    let missing = scheduler.run(|ctx: &TaskContext| ctx.param_as::<i64>(3));
    assert!(missing.wait(-1));
    assert!(missing.is_faulted());
    Ok(())
}

#[test]
fn unnamed_tasks_get_a_name_from_their_id() {
    let task = Task::new(|_ctx| Ok::<_, TaskError>(()));
    assert_eq!(task.name(), format!("task {}", task.id()));
    assert_eq!(task.status(), TaskStatus::Created);
    assert_eq!(task.worker_id(), None);
}

#[test]
fn created_task_does_not_run_until_started() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(2);

    let task = Task::new(|_ctx| Ok::<_, TaskError>(7));
    assert!(!task.wait(Timeout::from_millis(30)));
    assert_eq!(task.status(), TaskStatus::Created);

    task.start_on(&scheduler);
    assert_eq!(task.result_as::<i64>(-1), Some(7));
    assert!(task.worker_id().is_some());
    Ok(())
}

#[test]
fn result_with_timeout_returns_none_and_leaves_the_task_running() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(1);

    let task = scheduler.run(|_ctx| {
        thread::sleep(Duration::from_millis(300));
        Ok::<_, TaskError>("late")
    });

    assert_eq!(task.result(Timeout::from_millis(20)), None);
    assert!(!task.is_finished());

    assert_eq!(task.result_as::<String>(-1).as_deref(), Some("late"));
    Ok(())
}

#[test]
fn status_moves_through_running() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(1);

    let task = scheduler.run(|_ctx| {
        thread::sleep(Duration::from_millis(150));
        Ok::<_, TaskError>(())
    });

    assert!(wait_until(
        || task.status() == TaskStatus::Running,
        Duration::from_secs(2)
    ));
    assert!(task.wait(-1));
    assert_eq!(task.status(), TaskStatus::Completed);
    Ok(())
}

#[test]
fn resolved_constructors_are_terminal_immediately() -> TestResult {
    let done = Task::from_result(5);
    assert!(done.is_completed());
    assert_eq!(done.result_as::<i64>(0), Some(5));

    let null = Task::from_result(serde_json::Value::Null);
    assert!(null.is_completed());
    assert_eq!(null.result(0), None);

    let failed = Task::from_exception("bad input");
    assert!(failed.is_faulted());
    assert_eq!(failed.exception().map(|e| e.message().to_string()).as_deref(), Some("bad input"));

    let cancelled = Task::from_canceled();
    assert!(cancelled.is_canceled());
    assert!(cancelled.wait(0));
    Ok(())
}

#[test]
fn unserializable_results_fault_the_task() -> TestResult {
    use std::collections::HashMap;

    init_tracing();
    let scheduler = scheduler_with_level(1);

    // JSON object keys must be strings.
    let task = scheduler.run(|_ctx| {
        let mut map = HashMap::new();
        map.insert(vec![1u8], 1);
        Ok::<_, TaskError>(map)
    });

    assert!(task.wait(-1));
    let err = task.exception().ok_or("missing exception")?;
    assert_eq!(err.kind(), FaultKind::Unserializable);
    Ok(())
}

#[tokio::test]
async fn finished_resolves_in_async_code() -> TestResult {
    init_tracing();
    let scheduler = scheduler_with_level(1);

    let task = scheduler.run(|_ctx| {
        thread::sleep(Duration::from_millis(30));
        Ok::<_, TaskError>(1)
    });

    tokio::time::timeout(Duration::from_secs(5), task.finished()).await?;
    assert!(task.is_completed());
    Ok(())
}
