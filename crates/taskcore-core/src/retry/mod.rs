//! Retry and dead-letter engine (spec §4.4, C4).

pub mod backoff;

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use taskcore_db::models::{Task, TaskStatus};
use taskcore_db::queries::{dead_letter, tasks};

use crate::error::Result;
use crate::retention::RetentionPolicy;

/// Outcome of handling a failed task: either it was rescheduled with a
/// fresh `scheduled_at`, or its retry budget was exhausted and it moved
/// to the dead letter table.
#[derive(Debug, Clone)]
pub enum FailureOutcome {
    Rescheduled { task: Task, delay: std::time::Duration },
    DeadLettered { task_id: Uuid, reason: String },
}

/// Decide and execute the next step for a task currently in `failed`
/// status: retry with exponential backoff if the retry budget allows it,
/// otherwise quarantine it in `tasks_dead_letter` (spec §4.4 steps 1-6).
pub async fn handle_failure(
    pool: &PgPool,
    task_id: Uuid,
    reason: &str,
    policy: RetentionPolicy,
) -> Result<FailureOutcome> {
    let task = tasks::get_by_id(pool, task_id).await?;

    if task.retry_count < task.max_retries {
        let delay = backoff::next_delay(task.retry_delay_seconds, task.retry_count, task.max_retries);
        let scheduled_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();

        let mut retried = task.clone();
        retried.status = TaskStatus::Pending;
        retried.retry_count += 1;
        retried.worker_id = None;
        retried.process_pid = None;
        retried.started_at = None;
        retried.last_heartbeat = None;
        retried.scheduled_at = scheduled_at;

        let updated = tasks::update(pool, &retried).await?;
        crate::journal::log_retried(pool, policy, task_id, updated.retry_count, delay).await?;
        Ok(FailureOutcome::Rescheduled { task: updated, delay })
    } else {
        let record = dead_letter::move_to_dead_letter(pool, task_id, reason).await?;
        crate::journal::log_dead_lettered(pool, policy, task_id, reason).await?;
        Ok(FailureOutcome::DeadLettered {
            task_id: record.original_task_id,
            reason: reason.to_string(),
        })
    }
}
