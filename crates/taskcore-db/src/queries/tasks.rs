//! Database query functions for the `tasks` table (spec §4.1, component C1).

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{ErrorRecord, NotificationConfig, Task, TaskConfig, TaskPriority, TaskStatus};

/// Fields accepted when creating a new task. Server-assigned fields
/// (`id`, `created_at`, `updated_at`, `status`, `retry_count`) are not
/// settable by the caller.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub task_type: String,
    pub task_name: String,
    pub correlation_id: Option<String>,
    pub parent_task_id: Option<Uuid>,
    pub payload: Vec<u8>,
    pub config: TaskConfig,
    pub priority: TaskPriority,
    pub max_retries: i32,
    pub retry_delay_seconds: i64,
    pub required_cpu_cores: i32,
    pub required_memory_mb: i64,
    pub estimated_duration_seconds: Option<i64>,
    pub deadline: Option<DateTime<Utc>>,
    pub notification_config: NotificationConfig,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl Default for NewTask {
    fn default() -> Self {
        Self {
            task_type: String::new(),
            task_name: String::new(),
            correlation_id: None,
            parent_task_id: None,
            payload: Vec::new(),
            config: TaskConfig::default(),
            priority: TaskPriority::Normal,
            max_retries: 3,
            retry_delay_seconds: 5,
            required_cpu_cores: 0,
            required_memory_mb: 0,
            estimated_duration_seconds: None,
            deadline: None,
            notification_config: NotificationConfig::default(),
            user_id: None,
            session_id: None,
            tags: Vec::new(),
            metadata: serde_json::json!({}),
            scheduled_at: None,
        }
    }
}

/// Insert a new task row. Assigns `id`, `created_at`, `updated_at`, and
/// initial `status = pending`.
///
/// Rejects `max_retries < 0` (spec §4.1 `create` contract). Terminal
/// statuses cannot be requested at creation because `status` is always
/// server-assigned to `pending`.
pub async fn create(pool: &PgPool, new: &NewTask) -> Result<Task> {
    if new.max_retries < 0 {
        return Err(StoreError::InvalidArgument(
            "max_retries must be >= 0".to_string(),
        ));
    }
    if new.task_type.is_empty() || new.task_name.is_empty() {
        return Err(StoreError::InvalidArgument(
            "task_type and task_name must be non-empty".to_string(),
        ));
    }

    let scheduled_at = new.scheduled_at.unwrap_or_else(Utc::now);

    let task = sqlx::query_as::<_, Task>(
        "INSERT INTO tasks ( \
            task_type, task_name, correlation_id, parent_task_id, payload, config, \
            priority, max_retries, retry_delay_seconds, required_cpu_cores, \
            required_memory_mb, estimated_duration_seconds, deadline, \
            notification_config, user_id, session_id, tags, metadata, scheduled_at \
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19) \
         RETURNING *",
    )
    .bind(&new.task_type)
    .bind(&new.task_name)
    .bind(&new.correlation_id)
    .bind(new.parent_task_id)
    .bind(&new.payload)
    .bind(Json(&new.config))
    .bind(new.priority)
    .bind(new.max_retries)
    .bind(new.retry_delay_seconds)
    .bind(new.required_cpu_cores)
    .bind(new.required_memory_mb)
    .bind(new.estimated_duration_seconds)
    .bind(new.deadline)
    .bind(Json(&new.notification_config))
    .bind(&new.user_id)
    .bind(&new.session_id)
    .bind(&new.tags)
    .bind(&new.metadata)
    .bind(scheduled_at)
    .fetch_one(pool)
    .await?;

    Ok(task)
}

/// Fetch a task by id. Soft-deleted rows are returned (the tombstone is
/// observable) rather than hidden -- only queue queries exclude them
/// (spec §3.3 invariant 6, §4.1).
pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Task> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound { id })
}

/// Same as [`get_by_id`] but returns `None` instead of `NotFound`.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Task>> {
    Ok(
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

/// Full-row replacement. Rejects attempts that violate the status state
/// machine (spec §3.3); `updated_at` is stamped to the server clock
/// regardless of the caller-supplied value.
pub async fn update(pool: &PgPool, task: &Task) -> Result<Task> {
    let current = get_by_id(pool, task.id).await?;

    if current.status != task.status
        && !TaskStatus::is_valid_transition(current.status, task.status)
    {
        return Err(StoreError::InvalidTransition {
            id: task.id,
            from: current.status,
            to: task.status,
        });
    }

    if task.progress < 0.0 || task.progress > 100.0 {
        return Err(StoreError::InvalidArgument(
            "progress must be within [0, 100]".to_string(),
        ));
    }

    if current.status == TaskStatus::Running && task.progress < current.progress {
        return Err(StoreError::InvalidArgument(format!(
            "progress must not decrease while running: {} -> {}",
            current.progress, task.progress
        )));
    }

    if task.scheduled_at < current.scheduled_at {
        return Err(StoreError::InvalidArgument(
            "scheduled_at must never move backwards".to_string(),
        ));
    }

    let updated = sqlx::query_as::<_, Task>(
        "UPDATE tasks SET \
            task_type = $2, task_name = $3, correlation_id = $4, parent_task_id = $5, \
            payload = $6, config = $7, priority = $8, status = $9, progress = $10, \
            progress_message = $11, checkpoint = $12, max_retries = $13, retry_count = $14, \
            retry_delay_seconds = $15, last_error = $16, error_history = $17, \
            worker_id = $18, process_pid = $19, started_at = $20, completed_at = $21, \
            last_heartbeat = $22, deadline = $23, required_cpu_cores = $24, \
            required_memory_mb = $25, estimated_duration_seconds = $26, \
            actual_duration_seconds = $27, notification_config = $28, user_id = $29, \
            session_id = $30, tags = $31, metadata = $32, scheduled_at = $33, \
            deleted_at = $34, updated_at = now() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(task.id)
    .bind(&task.task_type)
    .bind(&task.task_name)
    .bind(&task.correlation_id)
    .bind(task.parent_task_id)
    .bind(&task.payload)
    .bind(&task.config)
    .bind(task.priority)
    .bind(task.status)
    .bind(task.progress)
    .bind(&task.progress_message)
    .bind(&task.checkpoint)
    .bind(task.max_retries)
    .bind(task.retry_count)
    .bind(task.retry_delay_seconds)
    .bind(&task.last_error)
    .bind(&task.error_history)
    .bind(&task.worker_id)
    .bind(task.process_pid)
    .bind(task.started_at)
    .bind(task.completed_at)
    .bind(task.last_heartbeat)
    .bind(task.deadline)
    .bind(task.required_cpu_cores)
    .bind(task.required_memory_mb)
    .bind(task.estimated_duration_seconds)
    .bind(task.actual_duration_seconds)
    .bind(&task.notification_config)
    .bind(&task.user_id)
    .bind(&task.session_id)
    .bind(&task.tags)
    .bind(&task.metadata)
    .bind(task.scheduled_at)
    .bind(task.deleted_at)
    .fetch_one(pool)
    .await?;

    Ok(updated)
}

/// Narrow fast path: transition `status` with optimistic locking on the
/// current status. Returns `InvalidTransition` if the edge is not legal,
/// `SerializationConflict` if another writer changed the status first.
pub async fn update_status(pool: &PgPool, id: Uuid, to: TaskStatus) -> Result<Task> {
    let current = get_by_id(pool, id).await?;

    if current.status == to {
        return Ok(current);
    }

    if !TaskStatus::is_valid_transition(current.status, to) {
        return Err(StoreError::InvalidTransition {
            id,
            from: current.status,
            to,
        });
    }

    let completed_at = if to.is_terminal() { Some(Utc::now()) } else { None };

    let result = sqlx::query(
        "UPDATE tasks SET status = $1, completed_at = COALESCE($2, completed_at), updated_at = now() \
         WHERE id = $3 AND status = $4",
    )
    .bind(to)
    .bind(completed_at)
    .bind(id)
    .bind(current.status)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::SerializationConflict { id });
    }

    get_by_id(pool, id).await
}

/// Update `progress` and `progress_message`. Rejects non-decreasing
/// violations while the task is `running` (spec invariant P4); a retry
/// that has reset status back to `pending` may set progress to any value
/// (e.g. 0, or restored from a checkpoint).
pub async fn update_progress(
    pool: &PgPool,
    id: Uuid,
    progress: f64,
    message: Option<&str>,
) -> Result<Task> {
    if !(0.0..=100.0).contains(&progress) {
        return Err(StoreError::InvalidArgument(
            "progress must be within [0, 100]".to_string(),
        ));
    }

    let current = get_by_id(pool, id).await?;

    if current.status == TaskStatus::Running && progress < current.progress {
        return Err(StoreError::InvalidArgument(format!(
            "progress must not decrease while running: {} -> {}",
            current.progress, progress
        )));
    }

    let result = sqlx::query(
        "UPDATE tasks SET progress = $1, progress_message = $2, updated_at = now() WHERE id = $3",
    )
    .bind(progress)
    .bind(message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound { id });
    }

    get_by_id(pool, id).await
}

/// Update `last_heartbeat` to now. Idempotent with respect to reclaim
/// decisions: calling twice in rapid succession behaves like one call
/// (spec §8.3).
pub async fn update_heartbeat(pool: &PgPool, id: Uuid) -> Result<()> {
    let result = sqlx::query("UPDATE tasks SET last_heartbeat = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound { id });
    }
    Ok(())
}

/// Persist worker-written checkpoint bytes, readable back via `get_by_id`.
pub async fn save_checkpoint(pool: &PgPool, id: Uuid, checkpoint: &[u8]) -> Result<()> {
    let result = sqlx::query("UPDATE tasks SET checkpoint = $1, updated_at = now() WHERE id = $2")
        .bind(checkpoint)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound { id });
    }
    Ok(())
}

/// Append an error record and set `last_error`. Used by the worker failure
/// path (spec §4.4) and the liveness reclaim path (spec §4.3).
pub async fn append_error(
    pool: &PgPool,
    id: Uuid,
    kind: &str,
    message: Option<&str>,
) -> Result<()> {
    let record = ErrorRecord {
        kind: kind.to_string(),
        message: message.map(|m| m.to_string()),
        at: Utc::now(),
    };
    let result = sqlx::query(
        "UPDATE tasks SET \
            last_error = COALESCE($1, last_error), \
            error_history = error_history || $2::jsonb, \
            updated_at = now() \
         WHERE id = $3",
    )
    .bind(message)
    .bind(serde_json::to_value(&[record]).expect("ErrorRecord always serializes"))
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound { id });
    }
    Ok(())
}

/// Read-only queue view: tasks with the given status, excluding
/// soft-deleted rows, paginated and ordered by `created_at` ascending.
pub async fn get_by_status(
    pool: &PgPool,
    status: TaskStatus,
    limit: i64,
    offset: i64,
) -> Result<Vec<Task>> {
    Ok(sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks \
         WHERE status = $1 AND deleted_at IS NULL \
         ORDER BY created_at ASC \
         LIMIT $2 OFFSET $3",
    )
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?)
}

/// Tasks eligible for dispatch ordering preview: `pending`, `scheduled_at
/// <= now`, not soft-deleted, ordered (priority, created_at) ascending
/// (spec §4.2 step 2). This is a read-only preview; actual admission runs
/// through [`crate::queries::dispatch::dequeue_candidate`].
pub async fn get_pending_tasks(pool: &PgPool, limit: i64) -> Result<Vec<Task>> {
    Ok(sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks \
         WHERE status = 'pending' AND scheduled_at <= now() AND deleted_at IS NULL \
         ORDER BY \
            CASE priority \
                WHEN 'critical' THEN 0 WHEN 'high' THEN 1 WHEN 'normal' THEN 2 \
                WHEN 'low' THEN 3 WHEN 'background' THEN 4 END ASC, \
            created_at ASC, id ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

/// Running tasks whose last heartbeat is older than `threshold`, OR whose
/// `deadline` has passed regardless of heartbeat freshness (spec §4.3).
pub async fn get_stale_tasks(
    pool: &PgPool,
    threshold: chrono::Duration,
) -> Result<Vec<Task>> {
    let cutoff = Utc::now() - threshold;
    Ok(sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks \
         WHERE status = 'running' AND deleted_at IS NULL \
           AND (last_heartbeat IS NULL OR last_heartbeat < $1 OR deadline < now()) \
         ORDER BY created_at ASC",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?)
}

/// Tasks currently claimed by a given worker.
pub async fn get_by_worker_id(pool: &PgPool, worker_id: &str) -> Result<Vec<Task>> {
    Ok(sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE worker_id = $1 AND deleted_at IS NULL ORDER BY created_at ASC",
    )
    .bind(worker_id)
    .fetch_all(pool)
    .await?)
}

/// Aggregate counts of non-deleted tasks by status.
#[derive(Debug, Clone, Default)]
pub struct StatusCounts {
    pub pending: i64,
    pub queued: i64,
    pub running: i64,
    pub paused: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
    pub dead_letter: i64,
    pub total: i64,
}

pub async fn count_by_status(pool: &PgPool) -> Result<StatusCounts> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status::text, COUNT(*) FROM tasks WHERE deleted_at IS NULL GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    let mut counts = StatusCounts::default();
    for (status, count) in &rows {
        match status.as_str() {
            "pending" => counts.pending = *count,
            "queued" => counts.queued = *count,
            "running" => counts.running = *count,
            "paused" => counts.paused = *count,
            "completed" => counts.completed = *count,
            "failed" => counts.failed = *count,
            "cancelled" => counts.cancelled = *count,
            "dead_letter" => counts.dead_letter = *count,
            _ => {}
        }
        counts.total += count;
    }
    Ok(counts)
}

/// Soft-delete a task: sets `deleted_at`, makes it invisible to queue
/// queries while still observable via `get_by_id`. Idempotent (spec §8.3).
pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<()> {
    let result = sqlx::query(
        "UPDATE tasks SET deleted_at = COALESCE(deleted_at, now()), updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound { id });
    }
    Ok(())
}

/// Permanently remove a task row and all dependent journal rows (cascade).
pub async fn hard_delete(pool: &PgPool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound { id });
    }
    Ok(())
}
