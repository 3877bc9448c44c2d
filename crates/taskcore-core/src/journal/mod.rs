//! Thin wrapper over `taskcore-db::queries::journal` adding structured
//! tracing at each append call site.
//!
//! Journals are not caches: nothing here reads `tasks` to reconstruct an
//! event after the fact. Every function below corresponds to one explicit
//! call site in the component that actually observed the event (spec §4.5,
//! §9).

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use taskcore_db::models::ExecutionHistoryEvent;
use taskcore_db::queries::journal;

use crate::error::Result;
use crate::retention::RetentionPolicy;

async fn append(
    pool: &PgPool,
    policy: RetentionPolicy,
    task_id: Uuid,
    event_type: &str,
    event_data: serde_json::Value,
    worker_id: Option<&str>,
) -> Result<ExecutionHistoryEvent> {
    let expires_at = policy.expires_at_for(Utc::now());
    let event = journal::log_event(pool, task_id, event_type, &event_data, worker_id, expires_at).await?;
    tracing::debug!(task_id = %task_id, event_type, "journal append");
    Ok(event)
}

pub async fn log_created(pool: &PgPool, policy: RetentionPolicy, task_id: Uuid) -> Result<()> {
    append(pool, policy, task_id, "created", serde_json::json!({}), None).await?;
    Ok(())
}

pub async fn log_dequeued(pool: &PgPool, policy: RetentionPolicy, task_id: Uuid, worker_id: &str) -> Result<()> {
    append(
        pool,
        policy,
        task_id,
        "dequeued",
        serde_json::json!({ "worker_id": worker_id }),
        Some(worker_id),
    )
    .await?;
    Ok(())
}

pub async fn log_progress(
    pool: &PgPool,
    policy: RetentionPolicy,
    task_id: Uuid,
    progress: f64,
    message: Option<&str>,
) -> Result<()> {
    append(
        pool,
        policy,
        task_id,
        "progress",
        serde_json::json!({ "progress": progress, "message": message }),
        None,
    )
    .await?;
    Ok(())
}

pub async fn log_checkpoint(pool: &PgPool, policy: RetentionPolicy, task_id: Uuid, size_bytes: usize) -> Result<()> {
    append(
        pool,
        policy,
        task_id,
        "checkpoint",
        serde_json::json!({ "size_bytes": size_bytes }),
        None,
    )
    .await?;
    Ok(())
}

pub async fn log_completed(pool: &PgPool, policy: RetentionPolicy, task_id: Uuid) -> Result<()> {
    append(pool, policy, task_id, "completed", serde_json::json!({}), None).await?;
    Ok(())
}

pub async fn log_failed(pool: &PgPool, policy: RetentionPolicy, task_id: Uuid, error_kind: &str) -> Result<()> {
    append(
        pool,
        policy,
        task_id,
        "failed",
        serde_json::json!({ "error_kind": error_kind }),
        None,
    )
    .await?;
    Ok(())
}

pub async fn log_cancelled(pool: &PgPool, policy: RetentionPolicy, task_id: Uuid) -> Result<()> {
    append(pool, policy, task_id, "cancelled", serde_json::json!({}), None).await?;
    Ok(())
}

pub async fn log_retried(
    pool: &PgPool,
    policy: RetentionPolicy,
    task_id: Uuid,
    retry_count: i32,
    delay: std::time::Duration,
) -> Result<()> {
    append(
        pool,
        policy,
        task_id,
        "retried",
        serde_json::json!({ "retry_count": retry_count, "delay_seconds": delay.as_secs() }),
        None,
    )
    .await?;
    tracing::info!(task_id = %task_id, retry_count, delay_seconds = delay.as_secs(), "task scheduled for retry");
    Ok(())
}

pub async fn log_dead_lettered(pool: &PgPool, policy: RetentionPolicy, task_id: Uuid, reason: &str) -> Result<()> {
    append(
        pool,
        policy,
        task_id,
        "dead_lettered",
        serde_json::json!({ "reason": reason }),
        None,
    )
    .await?;
    tracing::warn!(task_id = %task_id, reason, "task moved to dead letter");
    Ok(())
}

pub async fn log_heartbeat_missed(pool: &PgPool, policy: RetentionPolicy, task_id: Uuid, reason: &str) -> Result<()> {
    append(
        pool,
        policy,
        task_id,
        "heartbeat_missed",
        serde_json::json!({ "reason": reason }),
        None,
    )
    .await?;
    tracing::warn!(task_id = %task_id, reason, "stale task reclaimed by liveness monitor");
    Ok(())
}

/// Full history for a task, oldest first.
pub async fn get_task_history(pool: &PgPool, task_id: Uuid) -> Result<Vec<ExecutionHistoryEvent>> {
    Ok(journal::get_task_history(pool, task_id).await?)
}

/// Resource samples for a task, newest first.
pub async fn get_resource_history(
    pool: &PgPool,
    task_id: Uuid,
    limit: i64,
) -> Result<Vec<taskcore_db::models::ResourceSnapshot>> {
    Ok(taskcore_db::queries::resource_snapshots::get_resource_snapshots(pool, task_id, limit).await?)
}

/// Events whose `expires_at` has already passed, oldest first.
pub async fn get_expired_logs(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<ExecutionHistoryEvent>> {
    Ok(journal::get_expired_logs(pool, limit).await?)
}

/// Events older than `age`, regardless of `expires_at`.
pub async fn get_logs_older_than(
    pool: &PgPool,
    age: chrono::Duration,
) -> Result<Vec<ExecutionHistoryEvent>> {
    Ok(journal::get_logs_older_than(pool, age).await?)
}

pub async fn get_log_count(pool: &PgPool) -> Result<i64> {
    Ok(journal::get_log_count(pool).await?)
}

pub async fn get_log_stats(pool: &PgPool) -> Result<Vec<journal::EventTypeCount>> {
    Ok(journal::get_log_stats(pool).await?)
}

pub type EventTypeCount = journal::EventTypeCount;
