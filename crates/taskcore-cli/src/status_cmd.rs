//! `taskcore status` command: aggregate counts, or detail for one task.

use anyhow::{Context, Result};
use sqlx::PgPool;

use taskcore_db::models::TaskStatus;
use taskcore_db::queries::tasks;

use crate::submit_cmd::parse_task_id;

/// Run the status command.
///
/// When `task_id` is `Some`, shows a single task's full state. When
/// `None`, prints the aggregate count by status (spec §4.1
/// `count_by_status`).
pub async fn run_status(pool: &PgPool, task_id: Option<&str>) -> Result<()> {
    match task_id {
        Some(id_str) => run_task_detail(pool, id_str).await,
        None => run_aggregate(pool).await,
    }
}

async fn run_task_detail(pool: &PgPool, id_str: &str) -> Result<()> {
    let id = parse_task_id(id_str)?;
    let task = tasks::get_by_id(pool, id)
        .await
        .with_context(|| format!("task {id} not found"))?;

    println!("Task: {} ({})", task.task_name, task.id);
    println!("Type: {}", task.task_type);
    println!("Status: {}", task.status);
    println!("Priority: {}", task.priority);
    println!("Progress: {:.1}% {}", task.progress, task.progress_message.as_deref().unwrap_or(""));
    println!("Retries: {}/{}", task.retry_count, task.max_retries);
    if let Some(worker_id) = &task.worker_id {
        println!("Worker: {worker_id}");
    }
    if let Some(err) = &task.last_error {
        println!("Last error: {err}");
    }
    if let Some(deleted_at) = task.deleted_at {
        println!("Soft-deleted at: {}", deleted_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("Created: {}", task.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Scheduled: {}", task.scheduled_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(completed_at) = task.completed_at {
        println!("Completed: {}", completed_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    Ok(())
}

async fn run_aggregate(pool: &PgPool) -> Result<()> {
    let counts = tasks::count_by_status(pool).await?;

    println!("{:<12} {:>8}", "STATUS", "COUNT");
    println!("{}", "-".repeat(21));
    println!("{:<12} {:>8}", TaskStatus::Pending, counts.pending);
    println!("{:<12} {:>8}", TaskStatus::Queued, counts.queued);
    println!("{:<12} {:>8}", TaskStatus::Running, counts.running);
    println!("{:<12} {:>8}", TaskStatus::Paused, counts.paused);
    println!("{:<12} {:>8}", TaskStatus::Completed, counts.completed);
    println!("{:<12} {:>8}", TaskStatus::Failed, counts.failed);
    println!("{:<12} {:>8}", TaskStatus::Cancelled, counts.cancelled);
    println!("{:<12} {:>8}", TaskStatus::DeadLetter, counts.dead_letter);
    println!("{}", "-".repeat(21));
    println!("{:<12} {:>8}", "total", counts.total);

    Ok(())
}
