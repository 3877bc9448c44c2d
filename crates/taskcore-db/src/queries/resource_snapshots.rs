//! Resource usage samples (spec §3.4, §4.5).

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::ResourceSnapshot;

/// Fields accepted when recording a new sample. `id` and `sampled_at`
/// are server-assigned.
#[derive(Debug, Clone, Default)]
pub struct NewResourceSnapshot {
    pub task_id: Uuid,
    pub cpu_percent: f64,
    pub cpu_user_seconds: f64,
    pub cpu_system_seconds: f64,
    pub memory_rss_bytes: i64,
    pub memory_vms_bytes: i64,
    pub memory_percent: f64,
    pub io_read_bytes: i64,
    pub io_write_bytes: i64,
    pub io_read_count: i64,
    pub io_write_count: i64,
    pub net_bytes_sent: i64,
    pub net_bytes_recv: i64,
    pub open_connections: i32,
    pub open_files: i32,
    pub open_fds: i32,
    pub thread_count: i32,
    pub process_state: Option<String>,
}

pub async fn save_resource_snapshot(
    pool: &PgPool,
    snapshot: &NewResourceSnapshot,
) -> Result<ResourceSnapshot> {
    Ok(sqlx::query_as::<_, ResourceSnapshot>(
        "INSERT INTO task_resource_snapshots ( \
            task_id, cpu_percent, cpu_user_seconds, cpu_system_seconds, \
            memory_rss_bytes, memory_vms_bytes, memory_percent, \
            io_read_bytes, io_write_bytes, io_read_count, io_write_count, \
            net_bytes_sent, net_bytes_recv, open_connections, open_files, \
            open_fds, thread_count, process_state \
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
         RETURNING *",
    )
    .bind(snapshot.task_id)
    .bind(snapshot.cpu_percent)
    .bind(snapshot.cpu_user_seconds)
    .bind(snapshot.cpu_system_seconds)
    .bind(snapshot.memory_rss_bytes)
    .bind(snapshot.memory_vms_bytes)
    .bind(snapshot.memory_percent)
    .bind(snapshot.io_read_bytes)
    .bind(snapshot.io_write_bytes)
    .bind(snapshot.io_read_count)
    .bind(snapshot.io_write_count)
    .bind(snapshot.net_bytes_sent)
    .bind(snapshot.net_bytes_recv)
    .bind(snapshot.open_connections)
    .bind(snapshot.open_files)
    .bind(snapshot.open_fds)
    .bind(snapshot.thread_count)
    .bind(&snapshot.process_state)
    .fetch_one(pool)
    .await?)
}

/// Samples for a task, newest first, capped at `limit`.
pub async fn get_resource_snapshots(
    pool: &PgPool,
    task_id: Uuid,
    limit: i64,
) -> Result<Vec<ResourceSnapshot>> {
    Ok(sqlx::query_as::<_, ResourceSnapshot>(
        "SELECT * FROM task_resource_snapshots \
         WHERE task_id = $1 \
         ORDER BY sampled_at DESC \
         LIMIT $2",
    )
    .bind(task_id)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

/// The single most recent sample, if any.
pub async fn get_latest_resource_snapshot(
    pool: &PgPool,
    task_id: Uuid,
) -> Result<Option<ResourceSnapshot>> {
    Ok(sqlx::query_as::<_, ResourceSnapshot>(
        "SELECT * FROM task_resource_snapshots \
         WHERE task_id = $1 \
         ORDER BY sampled_at DESC \
         LIMIT 1",
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?)
}
