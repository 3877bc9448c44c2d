//! `taskcore history` and `taskcore snapshots`: read-only journal views
//! (spec §4.5, component C5).

use anyhow::Result;
use sqlx::PgPool;

use crate::submit_cmd::parse_task_id;

pub async fn run_history(pool: &PgPool, task_id: &str) -> Result<()> {
    let id = parse_task_id(task_id)?;
    let events = taskcore_core::journal::get_task_history(pool, id).await?;

    if events.is_empty() {
        println!("No history recorded for task {id}.");
        return Ok(());
    }

    println!("History for task {id} ({} events):", events.len());
    for event in &events {
        let time = event.created_at.format("%Y-%m-%d %H:%M:%S%.3f");
        let worker = event.worker_id.as_deref().unwrap_or("-");
        println!("  [{time}] {:<16} worker={worker} {}", event.event_type, event.event_data);
    }

    Ok(())
}

pub async fn run_snapshots(pool: &PgPool, task_id: &str, limit: i64) -> Result<()> {
    let id = parse_task_id(task_id)?;
    let snapshots = taskcore_core::journal::get_resource_history(pool, id, limit).await?;

    if snapshots.is_empty() {
        println!("No resource snapshots recorded for task {id}.");
        return Ok(());
    }

    println!("Resource snapshots for task {id} (most recent first):");
    for snap in &snapshots {
        let time = snap.sampled_at.format("%Y-%m-%d %H:%M:%S%.3f");
        println!(
            "  [{time}] cpu={:.1}% mem_rss={}MB threads={} fds={}",
            snap.cpu_percent,
            snap.memory_rss_bytes / (1024 * 1024),
            snap.thread_count,
            snap.open_fds,
        );
    }

    Ok(())
}
