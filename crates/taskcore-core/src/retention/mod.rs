//! Retention policy and the reaper loop that enforces it (spec §4.6, C6).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use taskcore_db::queries::journal;

use crate::config::RetentionConfig;
use crate::error::Result;

/// How long an execution-history event should be retained before the
/// reaper is allowed to delete it.
///
/// When both a day count and an explicit duration would apply, the
/// explicit duration takes precedence (spec §4.6 open question, resolved
/// in DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Events never expire; the reaper skips them.
    NoExpiration,
    /// Events expire `days` after creation.
    RetentionDays(u32),
    /// Events expire after an explicit duration, overriding `RetentionDays`
    /// if both would otherwise apply.
    RetentionTime(std::time::Duration),
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::RetentionDays(5)
    }
}

impl RetentionPolicy {
    /// Compute the `expires_at` timestamp for an event created at `now`
    /// under this policy. Returns `None` for [`Self::NoExpiration`].
    pub fn expires_at_for(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::NoExpiration => None,
            Self::RetentionDays(days) => Some(now + ChronoDuration::days(i64::from(*days))),
            Self::RetentionTime(duration) => {
                ChronoDuration::from_std(*duration).ok().map(|d| now + d)
            }
        }
    }

    /// Resolve the active policy from `TASKCORE_RETENTION_POLICY`, falling
    /// back to [`Self::default`] when the variable is unset or malformed.
    ///
    /// Accepted forms: `none` ([`Self::NoExpiration`]), `days:N`
    /// ([`Self::RetentionDays`]), `seconds:N` ([`Self::RetentionTime`]).
    pub fn from_env() -> Self {
        match std::env::var("TASKCORE_RETENTION_POLICY") {
            Ok(raw) => Self::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "invalid TASKCORE_RETENTION_POLICY, using default");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Parse the `TASKCORE_RETENTION_POLICY` wire format. `None` on any
    /// unrecognized input.
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("none") {
            return Some(Self::NoExpiration);
        }
        if let Some(days) = raw.strip_prefix("days:") {
            return days.parse::<u32>().ok().map(Self::RetentionDays);
        }
        if let Some(secs) = raw.strip_prefix("seconds:") {
            return secs
                .parse::<u64>()
                .ok()
                .map(|s| Self::RetentionTime(std::time::Duration::from_secs(s)));
        }
        None
    }
}

/// Run one reaper sweep: delete expired `task_execution_history` rows in
/// bounded batches until a batch comes back smaller than
/// `config.batch_size`, meaning the backlog is drained for this tick.
pub async fn tick(pool: &PgPool, config: &RetentionConfig) -> Result<u64> {
    let mut total_deleted = 0u64;
    loop {
        let deleted = journal::delete_expired_batch(pool, config.batch_size).await?;
        total_deleted += deleted;
        if deleted < config.batch_size as u64 {
            break;
        }
    }
    if total_deleted > 0 {
        tracing::info!(deleted = total_deleted, "retention reaper deleted expired history rows");
    }
    Ok(total_deleted)
}

/// Run the reaper forever on `config.sweep_interval`, stopping cleanly
/// when `cancel` fires. Mirrors the teacher orchestrator's
/// `tokio::select!`-driven cancellation handling.
pub async fn run_reaper_loop(pool: &PgPool, config: RetentionConfig, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(config.sweep_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("retention reaper stopping on cancellation");
                return;
            }
            _ = interval.tick() => {
                if let Err(err) = tick(pool, &config).await {
                    tracing::error!(error = %err, "retention reaper sweep failed");
                }
            }
        }
    }
}
