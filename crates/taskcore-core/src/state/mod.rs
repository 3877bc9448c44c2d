//! Task state machine: semantic operations layered over `taskcore-db`.
//!
//! Validates transitions against the graph in
//! [`taskcore_db::models::TaskStatus::is_valid_transition`], stamps
//! timestamps, and emits the structured tracing the ambient stack
//! requires on every transition (spec §3.3).

use sqlx::PgPool;
use uuid::Uuid;

use taskcore_db::models::{Task, TaskStatus};
use taskcore_db::queries::tasks;

use crate::error::Result;
use crate::retention::RetentionPolicy;

/// Submit a new task (producer entry point). Logs `created` to the
/// execution history journal.
pub async fn submit(
    pool: &PgPool,
    new_task: &tasks::NewTask,
    policy: RetentionPolicy,
) -> Result<Task> {
    let task = tasks::create(pool, new_task).await?;
    crate::journal::log_created(pool, policy, task.id).await?;
    Ok(task)
}

/// Mark a running task complete. Valid only from `running`.
pub async fn complete(pool: &PgPool, task_id: Uuid, policy: RetentionPolicy) -> Result<Task> {
    let task = tasks::update_status(pool, task_id, TaskStatus::Completed).await?;
    crate::journal::log_completed(pool, policy, task_id).await?;
    tracing::info!(task_id = %task_id, "task completed");
    Ok(task)
}

/// Record a failure. Appends the error record and transitions to
/// `failed`; deciding whether the task is retried or dead-lettered is
/// [`crate::retry`]'s responsibility, not this function's.
pub async fn fail(
    pool: &PgPool,
    task_id: Uuid,
    error_kind: &str,
    message: Option<&str>,
    policy: RetentionPolicy,
) -> Result<Task> {
    tasks::append_error(pool, task_id, error_kind, message).await?;
    let task = tasks::update_status(pool, task_id, TaskStatus::Failed).await?;
    crate::journal::log_failed(pool, policy, task_id, error_kind).await?;
    tracing::warn!(task_id = %task_id, error_kind, "task failed");
    Ok(task)
}

/// Cancel a task. Rejected by the state graph unless the task is in a
/// non-terminal status; callers should additionally check
/// `TaskConfig::allow_cancel` before calling this (spec §3.2) -- the
/// state machine itself only enforces the status graph, not policy.
pub async fn cancel(pool: &PgPool, task_id: Uuid, policy: RetentionPolicy) -> Result<Task> {
    let task = tasks::update_status(pool, task_id, TaskStatus::Cancelled).await?;
    crate::journal::log_cancelled(pool, policy, task_id).await?;
    tracing::info!(task_id = %task_id, "task cancelled");
    Ok(task)
}

/// Pause a running task. Callers should check `TaskConfig::allow_pause`
/// before calling this, same as [`cancel`].
pub async fn pause(pool: &PgPool, task_id: Uuid) -> Result<Task> {
    tasks::update_status(pool, task_id, TaskStatus::Paused).await.map_err(Into::into)
}

/// Resume a paused task back to `running`.
pub async fn resume(pool: &PgPool, task_id: Uuid) -> Result<Task> {
    tasks::update_status(pool, task_id, TaskStatus::Running).await.map_err(Into::into)
}
