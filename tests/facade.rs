// tests/facade.rs
//
// Exercises the free functions backed by the process-wide scheduler. The
// ceiling of that scheduler is shared by every test in this binary, so no
// test here changes it.

mod common;
use crate::common::init_tracing;

use std::error::Error;

use rtask::{TaskContext, TaskError, TaskOptions, wait_all};
use serde_json::json;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn run_submits_to_the_global_scheduler() -> TestResult {
    init_tracing();

    let task = rtask::run(|_ctx| Ok::<_, TaskError>("task"));
    let next = task.continue_with(|ctx: &TaskContext| {
        let antecedent = ctx.antecedent().ok_or("missing antecedent")?;
        Ok::<_, TaskError>(format!("{}+next", antecedent.result_as::<String>(0).unwrap_or_default()))
    });

    assert!(wait_all(&[task.clone(), next.clone()], -1));
    assert_eq!(next.result_as::<String>(0).as_deref(), Some("task+next"));
    Ok(())
}

#[test]
fn run_with_binds_name_and_params() -> TestResult {
    init_tracing();

    let task = rtask::run_with(
        TaskOptions::new().name("greet").param("world"),
        |ctx: &TaskContext| Ok::<_, TaskError>(format!("hello {}", ctx.param_as::<String>(0)?)),
    );

    assert_eq!(task.result_as::<String>(-1).as_deref(), Some("hello world"));
    assert_eq!(task.name(), "greet");
    Ok(())
}

#[test]
fn run_each_returns_tasks_in_input_order() -> TestResult {
    init_tracing();

    let tasks = rtask::run_each(vec![1, 2, 3], |ctx: &TaskContext| {
        Ok::<_, TaskError>(ctx.param_as::<i64>(0)? * 2)
    });
    assert_eq!(tasks.len(), 3);
    assert!(wait_all(&tasks, -1));

    let results: Vec<Option<i64>> = tasks.iter().map(|t| t.result_as(0)).collect();
    assert_eq!(results, [Some(2), Some(4), Some(6)]);
    Ok(())
}

#[test]
fn run_each_with_index_passes_the_position() -> TestResult {
    init_tracing();

    let tasks = rtask::run_each_with_index(["a", "b", "c"], |ctx: &TaskContext| {
        let item = ctx.param_as::<String>(0)?;
        let index = ctx.param_as::<usize>(1)?;
        Ok::<_, TaskError>(format!("{item}{index}"))
    });
    assert!(wait_all(&tasks, -1));

    let results: Vec<String> = tasks
        .iter()
        .filter_map(|t| t.result_as::<String>(0))
        .collect();
    assert_eq!(results, ["a0", "b1", "c2"]);
    Ok(())
}

#[test]
fn run_each_over_nothing_creates_no_tasks() {
    let none: Option<i64> = None;
    let tasks = rtask::run_each(none, |_ctx| Ok::<_, TaskError>(()));
    assert!(tasks.is_empty());

    let empty: Vec<i64> = Vec::new();
    assert!(rtask::run_each_with_index(empty, |_ctx| Ok::<_, TaskError>(())).is_empty());
}

#[test]
fn resolved_helpers() {
    let done = rtask::from_result(json!({ "answer": 42 }));
    assert!(done.is_completed());
    assert_eq!(done.result(0), Some(json!({ "answer": 42 })));

    let failed = rtask::from_exception(TaskError::new("bad"));
    assert!(failed.is_faulted());

    assert!(rtask::from_canceled().is_canceled());
}

#[test]
fn global_parallel_level_rejects_zero() {
    let level = rtask::parallel_level();
    assert!(level >= 1);
    assert!(!rtask::set_parallel_level(0));
    assert_eq!(rtask::parallel_level(), level);
}
