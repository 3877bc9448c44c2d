//! `taskcore reap run`: the retention reaper entry point (spec §4.6,
//! component C6).

use anyhow::Result;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use taskcore_core::config::RetentionConfig;
use taskcore_core::retention;

pub async fn run_once(pool: &PgPool) -> Result<()> {
    let deleted = retention::tick(pool, &RetentionConfig::from_env()).await?;
    println!("Retention sweep deleted {deleted} expired history row(s).");
    Ok(())
}

/// Run the retention reaper until Ctrl+C, then drain cleanly.
pub async fn run_loop(pool: &PgPool) -> Result<()> {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        eprintln!("\nShutting down retention reaper...");
        cancel_clone.cancel();
    });

    println!("Retention reaper running (Ctrl+C to stop)...");
    retention::run_reaper_loop(pool, RetentionConfig::from_env(), cancel).await;
    println!("Retention reaper stopped.");
    Ok(())
}
