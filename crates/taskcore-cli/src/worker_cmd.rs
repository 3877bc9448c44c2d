//! `taskcore worker <subcommand>`: the worker-facing surface over the
//! dispatcher, journal, and retry engine (spec §4.2, §4.4, §4.5).

use anyhow::Result;
use sqlx::PgPool;

use taskcore_core::config::DispatchConfig;
use taskcore_core::dispatch::{Dispatcher, WorkerCapacity};
use taskcore_core::retention::RetentionPolicy;
use taskcore_db::queries::tasks;

use crate::submit_cmd::parse_task_id;

pub async fn run_dequeue(
    pool: &PgPool,
    worker_id: &str,
    cpu_cores: i32,
    memory_mb: i64,
    pid: Option<i64>,
) -> Result<()> {
    let dispatcher = Dispatcher::new(pool, DispatchConfig::default())
        .with_retention_policy(RetentionPolicy::from_env());
    let capacity = WorkerCapacity { cpu_cores, memory_mb };

    match dispatcher.dequeue(worker_id, pid, capacity).await? {
        Some(task) => {
            println!("Claimed task {} ({})", task.id, task.task_name);
            println!("  type: {}", task.task_type);
            println!("  priority: {}", task.priority);
            println!("  payload: {} bytes", task.payload.len());
            if let Some(checkpoint) = &task.checkpoint {
                println!("  checkpoint: {} bytes (resume from here)", checkpoint.len());
            }
        }
        None => println!("No eligible task for worker {worker_id}."),
    }

    Ok(())
}

pub async fn run_heartbeat(pool: &PgPool, task_id: &str) -> Result<()> {
    let id = parse_task_id(task_id)?;
    tasks::update_heartbeat(pool, id).await?;
    println!("Heartbeat recorded for task {id}.");
    Ok(())
}

pub async fn run_progress(pool: &PgPool, task_id: &str, progress: f64, message: Option<&str>) -> Result<()> {
    let id = parse_task_id(task_id)?;
    tasks::update_progress(pool, id, progress, message).await?;
    taskcore_core::journal::log_progress(pool, RetentionPolicy::from_env(), id, progress, message).await?;
    println!("Progress for task {id}: {progress:.1}%");
    Ok(())
}

pub async fn run_checkpoint(pool: &PgPool, task_id: &str, data: &str) -> Result<()> {
    let id = parse_task_id(task_id)?;
    let bytes = data.as_bytes();
    tasks::save_checkpoint(pool, id, bytes).await?;
    taskcore_core::journal::log_checkpoint(pool, RetentionPolicy::from_env(), id, bytes.len()).await?;
    println!("Checkpoint saved for task {id} ({} bytes).", bytes.len());
    Ok(())
}

pub async fn run_complete(pool: &PgPool, task_id: &str) -> Result<()> {
    let id = parse_task_id(task_id)?;
    let task = taskcore_core::state::complete(pool, id, RetentionPolicy::from_env()).await?;
    println!("Task {} marked completed.", task.id);
    Ok(())
}

pub async fn run_fail(pool: &PgPool, task_id: &str, kind: &str, message: Option<&str>) -> Result<()> {
    let id = parse_task_id(task_id)?;
    let policy = RetentionPolicy::from_env();
    taskcore_core::state::fail(pool, id, kind, message, policy).await?;

    let reason = message.unwrap_or(kind);
    match taskcore_core::retry::handle_failure(pool, id, reason, policy).await? {
        taskcore_core::retry::FailureOutcome::Rescheduled { task, delay } => {
            println!(
                "Task {} rescheduled (retry {}/{}), next attempt in {}s.",
                task.id,
                task.retry_count,
                task.max_retries,
                delay.as_secs()
            );
        }
        taskcore_core::retry::FailureOutcome::DeadLettered { task_id, reason } => {
            println!("Task {task_id} moved to dead letter: {reason}");
        }
    }
    Ok(())
}

pub async fn run_cancel(pool: &PgPool, task_id: &str) -> Result<()> {
    let id = parse_task_id(task_id)?;
    let task = taskcore_core::state::cancel(pool, id, RetentionPolicy::from_env()).await?;
    println!("Task {} cancelled.", task.id);
    Ok(())
}

pub async fn run_claimed(pool: &PgPool, worker_id: &str) -> Result<()> {
    let tasks = tasks::get_by_worker_id(pool, worker_id).await?;
    if tasks.is_empty() {
        println!("Worker {worker_id} holds no tasks.");
        return Ok(());
    }
    for task in &tasks {
        println!(
            "{} {:<20} {:<10} progress={:.1}",
            task.id, task.task_name, task.status, task.progress
        );
    }
    Ok(())
}
