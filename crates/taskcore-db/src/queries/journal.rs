//! Append-only execution history (spec §4.5, component C4).
//!
//! Journals are not caches: every row is written by an explicit call
//! site, never derived from `tasks` row state. Nothing here reads
//! `tasks` to backfill history.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::ExecutionHistoryEvent;

/// Append one event to a task's history. `expires_at` is computed by the
/// caller from the active [`crate::models` retention policy] at the time
/// of the call, not recomputed later (spec §4.6: retention is fixed at
/// write time).
pub async fn log_event(
    pool: &PgPool,
    task_id: Uuid,
    event_type: &str,
    event_data: &serde_json::Value,
    worker_id: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<ExecutionHistoryEvent> {
    let event = sqlx::query_as::<_, ExecutionHistoryEvent>(
        "INSERT INTO task_execution_history (task_id, event_type, event_data, worker_id, expires_at) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(task_id)
    .bind(event_type)
    .bind(event_data)
    .bind(worker_id)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(event)
}

/// Full history for a task, oldest first.
pub async fn get_task_history(pool: &PgPool, task_id: Uuid) -> Result<Vec<ExecutionHistoryEvent>> {
    Ok(sqlx::query_as::<_, ExecutionHistoryEvent>(
        "SELECT * FROM task_execution_history WHERE task_id = $1 ORDER BY created_at ASC",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await?)
}

/// History rows whose `expires_at` has already passed.
pub async fn get_expired_logs(pool: &PgPool, limit: i64) -> Result<Vec<ExecutionHistoryEvent>> {
    Ok(sqlx::query_as::<_, ExecutionHistoryEvent>(
        "SELECT * FROM task_execution_history \
         WHERE expires_at IS NOT NULL AND expires_at <= now() \
         ORDER BY expires_at ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

/// History rows older than `age`, regardless of whether `expires_at` was
/// ever set. Used by operators enforcing a retention policy after the
/// fact (spec §4.6 "operator override").
pub async fn get_logs_older_than(pool: &PgPool, age: Duration) -> Result<Vec<ExecutionHistoryEvent>> {
    let cutoff = Utc::now() - age;
    Ok(sqlx::query_as::<_, ExecutionHistoryEvent>(
        "SELECT * FROM task_execution_history WHERE created_at < $1 ORDER BY created_at ASC",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?)
}

pub async fn get_log_count(pool: &PgPool) -> Result<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM task_execution_history")
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

/// Per-event-type counts, for operator visibility into what the journal
/// holds before running a reaper pass.
#[derive(Debug, Clone)]
pub struct EventTypeCount {
    pub event_type: String,
    pub count: i64,
}

pub async fn get_log_stats(pool: &PgPool) -> Result<Vec<EventTypeCount>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT event_type, COUNT(*) FROM task_execution_history GROUP BY event_type ORDER BY event_type",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(event_type, count)| EventTypeCount { event_type, count })
        .collect())
}

/// Delete up to `batch_size` expired rows in one statement. Returns the
/// number deleted so the retention reaper can decide whether to loop
/// again immediately (spec §4.6 bounded-batch requirement).
pub async fn delete_expired_batch(pool: &PgPool, batch_size: i64) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM task_execution_history \
         WHERE id IN ( \
            SELECT id FROM task_execution_history \
            WHERE expires_at IS NOT NULL AND expires_at <= now() \
            ORDER BY expires_at ASC \
            LIMIT $1 \
         )",
    )
    .bind(batch_size)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
