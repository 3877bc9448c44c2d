//! Atomic dequeue for the dispatcher (spec §4.2, component C2).

use chrono::Utc;
use sqlx::PgPool;

use crate::error::Result;
use crate::models::Task;

/// Capacity a worker is currently offering. `None` disables the
/// corresponding filter entirely (the worker makes no claim about that
/// resource); `Some(0)` is a real capacity of zero and matches only
/// tasks that require none of it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capacity {
    pub cpu_cores: Option<i32>,
    pub memory_mb: Option<i64>,
}

/// Atomically claim the next eligible task for `worker_id`.
///
/// Implements spec §4.2 steps 1-6 in a single transaction:
/// 1. select candidates with `status = 'pending'`, `scheduled_at <= now()`,
///    not soft-deleted, and within the offered `capacity`,
/// 2. order by `(priority, created_at, id)` ascending so ties break
///    deterministically,
/// 3. lock the winning row with `FOR UPDATE SKIP LOCKED` so concurrent
///    dispatchers never block on each other nor double-claim,
/// 4. take the single highest-priority, oldest candidate,
/// 5. flip it to `running` and stamp `worker_id`, `process_pid`,
///    `started_at`, `last_heartbeat`,
/// 6. return `None` when no eligible row exists instead of erroring.
///
/// `SKIP LOCKED` is what makes this safe under concurrent dispatchers:
/// a row already locked by another in-flight dequeue is invisible to
/// this query rather than a source of contention.
pub async fn dequeue_candidate(
    pool: &PgPool,
    worker_id: &str,
    process_pid: Option<i64>,
    capacity: Capacity,
) -> Result<Option<Task>> {
    let mut tx = pool.begin().await?;

    let candidate = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks \
         WHERE status = 'pending' AND scheduled_at <= now() AND deleted_at IS NULL \
           AND ($1::int IS NULL OR required_cpu_cores <= $1) \
           AND ($2::bigint IS NULL OR required_memory_mb <= $2) \
         ORDER BY \
            CASE priority \
                WHEN 'critical' THEN 0 WHEN 'high' THEN 1 WHEN 'normal' THEN 2 \
                WHEN 'low' THEN 3 WHEN 'background' THEN 4 END ASC, \
            created_at ASC, id ASC \
         LIMIT 1 \
         FOR UPDATE SKIP LOCKED",
    )
    .bind(capacity.cpu_cores)
    .bind(capacity.memory_mb)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(candidate) = candidate else {
        tx.commit().await?;
        return Ok(None);
    };

    let now = Utc::now();
    let claimed = sqlx::query_as::<_, Task>(
        "UPDATE tasks SET \
            status = 'running', worker_id = $1, process_pid = $2, \
            started_at = $3, last_heartbeat = $3, updated_at = $3 \
         WHERE id = $4 \
         RETURNING *",
    )
    .bind(worker_id)
    .bind(process_pid)
    .bind(now)
    .bind(candidate.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(claimed))
}

/// Number of tasks currently eligible for dequeue, for dispatcher
/// backpressure decisions. Not part of the claim transaction; purely
/// advisory (spec §4.2 note on preview queries being racy by nature).
pub async fn eligible_count(pool: &PgPool) -> Result<i64> {
    let count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM tasks \
         WHERE status = 'pending' AND scheduled_at <= now() AND deleted_at IS NULL",
    )
    .fetch_one(pool)
    .await?;
    Ok(count.0)
}
