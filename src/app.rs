// src/app.rs

//! High-level entry point used by `main.rs`.
//!
//! This wires together:
//! - config loading (`--config` or `Rtask.toml`, environment, CLI override)
//! - a scheduler on the current tokio runtime
//! - a synthetic workload of sleeping tasks and continuations
//! - Ctrl-C handling (cancels everything still in flight)

use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command, RunArgs};
use crate::config::{SchedulerConfig, default_config_path, load_and_validate, validate_config};
use crate::errors::TaskError;
use crate::scheduler::Scheduler;
use crate::task::{Task, TaskContext, TaskOptions, TaskStatus};

pub async fn run(args: CliArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => load_and_validate(path)?,
        None => {
            let path = default_config_path();
            if path.is_file() {
                load_and_validate(&path)?
            } else {
                SchedulerConfig::from_env()
            }
        }
    };
    if let Some(level) = args.parallel_level {
        config.parallel_level = level;
    }
    validate_config(&config)?;

    if args.dry_run {
        print_dry_run(&config);
        return Ok(());
    }

    let run_args = match args.command {
        Some(Command::Run(run_args)) => run_args,
        None => RunArgs::default(),
    };

    let scheduler = Scheduler::with_handle(config, Handle::current())?;
    let started = Instant::now();
    let workload = submit_workload(&scheduler, &run_args);
    info!(
        roots = run_args.tasks,
        total = workload.len(),
        parallel_level = scheduler.parallel_level(),
        "workload submitted"
    );

    tokio::select! {
        finished = wait_for(&workload, run_args.timeout_ms) => {
            if !finished {
                warn!(timeout_ms = run_args.timeout_ms, "timed out waiting for workload");
            }
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for Ctrl+C");
            }
            let cancelled = scheduler.cancel_all();
            warn!(cancelled, "interrupted; cancelled outstanding work");
        }
    }

    print_summary(&workload, &scheduler, started.elapsed());
    Ok(())
}

/// Submit `args.tasks` roots, each with a chain of `args.continuations`.
fn submit_workload(scheduler: &Scheduler, args: &RunArgs) -> Vec<Task> {
    let sleep = Duration::from_millis(args.sleep_ms);
    let mut all = Vec::new();

    for index in 0..args.tasks {
        let fail = args.fail_every > 0 && (index + 1) % args.fail_every == 0;
        let options = TaskOptions::new()
            .name(format!("root-{index}"))
            .param(index);

        let root = Task::with_options(options, move |ctx: &TaskContext| {
            nap(ctx, sleep);
            if fail {
                return Err(TaskError::new(format!("{} failed on purpose", ctx.name())));
            }
            ctx.param_as::<u64>(0)
        });

        let mut tail = root.clone();
        all.push(root.clone());
        for depth in 0..args.continuations {
            let options = TaskOptions::new().name(format!("root-{index}/cont-{depth}"));
            tail = tail.continue_with_options(options, move |ctx: &TaskContext| {
                nap(ctx, sleep);
                let previous = ctx
                    .antecedent()
                    .and_then(|a| a.result_as::<u64>(0))
                    .unwrap_or_default();
                Ok::<_, TaskError>(previous + 1)
            });
            all.push(tail.clone());
        }

        root.start_on(scheduler);
    }

    all
}

/// Sleep in short slices so cancellation is noticed quickly.
fn nap(ctx: &TaskContext, total: Duration) {
    let slice = Duration::from_millis(10);
    let deadline = Instant::now() + total;
    while !ctx.is_cancelled() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep(slice.min(deadline - now));
    }
}

async fn wait_for(tasks: &[Task], timeout_ms: i64) -> bool {
    let all = async {
        for task in tasks {
            task.finished().await;
        }
    };

    match u64::try_from(timeout_ms) {
        Ok(ms) => tokio::time::timeout(Duration::from_millis(ms), all)
            .await
            .is_ok(),
        Err(_) => {
            all.await;
            true
        }
    }
}

fn print_summary(tasks: &[Task], scheduler: &Scheduler, elapsed: Duration) {
    let count = |status: TaskStatus| tasks.iter().filter(|t| t.status() == status).count();
    let stats = scheduler.stats();

    println!("rtask run summary");
    println!("  parallel_level = {}", stats.parallel_level);
    println!("  elapsed_ms     = {}", elapsed.as_millis());
    println!("  tasks          = {}", tasks.len());
    println!("    completed    = {}", count(TaskStatus::Completed));
    println!("    faulted      = {}", count(TaskStatus::Faulted));
    println!("    canceled     = {}", count(TaskStatus::Canceled));
    println!(
        "    unfinished   = {}",
        tasks.iter().filter(|t| !t.is_finished()).count()
    );

    for task in tasks.iter().filter(|t| t.is_faulted()) {
        if let Some(err) = task.exception() {
            println!("  {} faulted: {}", task.name(), err);
        }
    }

    debug!(?stats, "summary printed");
}

fn print_dry_run(config: &SchedulerConfig) {
    println!("rtask dry-run");
    println!("  scheduler.parallel_level = {}", config.parallel_level);
    println!("  runtime.worker_threads   = {}", config.worker_threads);
    println!("  runtime.thread_name      = {}", config.thread_name);
}
