//! `taskcore liveness run`: the liveness monitor entry point (spec §4.3,
//! component C3).

use anyhow::Result;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use taskcore_core::config::LivenessConfig;
use taskcore_core::liveness;
use taskcore_core::retention::RetentionPolicy;

pub async fn run_once(pool: &PgPool) -> Result<()> {
    let reclaimed = liveness::tick(pool, &LivenessConfig::default(), RetentionPolicy::from_env()).await?;
    println!("Liveness sweep reclaimed {reclaimed} stale task(s).");
    Ok(())
}

/// Run the liveness monitor until Ctrl+C, then drain cleanly.
pub async fn run_loop(pool: &PgPool) -> Result<()> {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        eprintln!("\nShutting down liveness monitor...");
        cancel_clone.cancel();
    });

    println!("Liveness monitor running (Ctrl+C to stop)...");
    liveness::run_liveness_loop(pool, LivenessConfig::default(), RetentionPolicy::from_env(), cancel).await;
    println!("Liveness monitor stopped.");
    Ok(())
}
