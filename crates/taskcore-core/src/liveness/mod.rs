//! Liveness monitor: reclaims `running` tasks that have gone stale
//! (spec §4.3, C3).

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use taskcore_db::queries::tasks;

use crate::config::LivenessConfig;
use crate::error::Result;
use crate::retention::RetentionPolicy;
use crate::retry;

/// Run one scan-and-reclaim pass: find every `running` task whose
/// heartbeat is older than `config.heartbeat_timeout`, or whose
/// `deadline` has passed regardless of heartbeat freshness, and hand
/// each one to [`retry::handle_failure`] as if it had reported a
/// failure itself.
///
/// Returns the number of tasks reclaimed.
pub async fn tick(pool: &PgPool, config: &LivenessConfig, policy: RetentionPolicy) -> Result<usize> {
    let stale = tasks::get_stale_tasks(pool, config.heartbeat_timeout).await?;

    let mut reclaimed = 0;
    for task in &stale {
        let reason = if task.last_heartbeat.is_none() {
            "no heartbeat received".to_string()
        } else if task.deadline.is_some_and(|d| d < chrono::Utc::now()) {
            "deadline exceeded".to_string()
        } else {
            "heartbeat timeout".to_string()
        };

        tasks::append_error(pool, task.id, "stuck", Some(&reason)).await?;
        tasks::update_status(pool, task.id, taskcore_db::models::TaskStatus::Failed).await?;
        crate::journal::log_heartbeat_missed(pool, policy, task.id, &reason).await?;

        retry::handle_failure(pool, task.id, &reason, policy).await?;
        reclaimed += 1;
    }

    if reclaimed > 0 {
        tracing::warn!(reclaimed, "liveness monitor reclaimed stale tasks");
    }

    Ok(reclaimed)
}

/// Run the liveness monitor forever on `config.check_interval`, stopping
/// cleanly when `cancel` fires. Mirrors the teacher orchestrator's
/// `tokio::select!`-driven cancellation handling.
pub async fn run_liveness_loop(
    pool: &PgPool,
    config: LivenessConfig,
    policy: RetentionPolicy,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(config.check_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("liveness monitor stopping on cancellation");
                return;
            }
            _ = interval.tick() => {
                if let Err(err) = tick(pool, &config, policy).await {
                    tracing::error!(error = %err, "liveness monitor tick failed");
                }
            }
        }
    }
}
