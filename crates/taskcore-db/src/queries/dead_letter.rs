//! Dead-letter transfer (spec §4.4, component C3 terminal path).

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{DeadLetterRecord, Task, TaskStatus};

/// Atomically flip a task to `dead_letter` and write its snapshot into
/// `tasks_dead_letter`, in one transaction (spec invariant P5: the move
/// is never observed half-done -- a reader sees either the task still
/// `failed` with no dead-letter row, or `dead_letter` with the row
/// present, never a state in between).
///
/// Only callable from `failed` with `retry_count >= max_retries`; any
/// other starting status is rejected as an invalid transition.
pub async fn move_to_dead_letter(
    pool: &PgPool,
    task_id: Uuid,
    failure_reason: &str,
) -> Result<DeadLetterRecord> {
    let mut tx = pool.begin().await?;

    let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1 FOR UPDATE")
        .bind(task_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound { id: task_id })?;

    if !TaskStatus::is_valid_transition(task.status, TaskStatus::DeadLetter) {
        return Err(StoreError::InvalidTransition {
            id: task_id,
            from: task.status,
            to: TaskStatus::DeadLetter,
        });
    }

    if task.retry_count < task.max_retries {
        return Err(StoreError::InvalidArgument(format!(
            "task {task_id} has not exhausted retries ({} < {})",
            task.retry_count, task.max_retries
        )));
    }

    let task_data = serde_json::to_value(&task).map_err(|e| {
        StoreError::InvalidArgument(format!("failed to serialize task snapshot: {e}"))
    })?;

    let record = sqlx::query_as::<_, DeadLetterRecord>(
        "INSERT INTO tasks_dead_letter (original_task_id, task_data, failure_reason) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(task_id)
    .bind(&task_data)
    .bind(failure_reason)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE tasks SET status = 'dead_letter', completed_at = now(), updated_at = now() WHERE id = $1",
    )
    .bind(task_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(record)
}

/// Fetch a dead-letter record by its own id.
pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<DeadLetterRecord> {
    sqlx::query_as::<_, DeadLetterRecord>("SELECT * FROM tasks_dead_letter WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound { id })
}

/// Dead-letter records referencing a given original task, newest first.
pub async fn get_by_original_task_id(
    pool: &PgPool,
    original_task_id: Uuid,
) -> Result<Vec<DeadLetterRecord>> {
    Ok(sqlx::query_as::<_, DeadLetterRecord>(
        "SELECT * FROM tasks_dead_letter WHERE original_task_id = $1 ORDER BY created_at DESC",
    )
    .bind(original_task_id)
    .fetch_all(pool)
    .await?)
}

/// All dead-letter records, newest first, paginated.
pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<DeadLetterRecord>> {
    Ok(sqlx::query_as::<_, DeadLetterRecord>(
        "SELECT * FROM tasks_dead_letter ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?)
}
