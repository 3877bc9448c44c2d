//! Runtime configuration for the orchestration loops.

use std::time::Duration;

use crate::retention::RetentionPolicy;

/// Configuration for the dispatcher's dequeue loop.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// How long to sleep between poll attempts when the queue is empty.
    pub poll_interval: Duration,
    /// Maximum optimistic-lock retries before giving up on a single
    /// dequeue attempt (spec §4.2 contention handling).
    pub max_claim_attempts: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_claim_attempts: 5,
        }
    }
}

/// Configuration for the liveness monitor (spec §4.3, §8.3).
#[derive(Debug, Clone)]
pub struct LivenessConfig {
    /// How often the monitor scans for stale `running` tasks.
    pub check_interval: Duration,
    /// How long a task may go without a heartbeat before it is
    /// considered stuck, absent an earlier `deadline`.
    pub heartbeat_timeout: chrono::Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(15),
            heartbeat_timeout: chrono::Duration::seconds(90),
        }
    }
}

/// Configuration for the retention reaper (spec §4.6).
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// How often the reaper wakes up to delete an expired batch.
    pub sweep_interval: Duration,
    /// Maximum rows deleted per sweep, to bound lock hold time.
    pub batch_size: i64,
    /// The policy journal writers stamp onto new rows' `expires_at` at
    /// insert time (spec §4.6: "computes it from the current policy at
    /// insert time"). Changing this does not re-stamp existing rows.
    pub policy: RetentionPolicy,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(3600),
            batch_size: 1000,
            policy: RetentionPolicy::default(),
        }
    }
}

impl RetentionConfig {
    /// Build a config with `policy` resolved from `TASKCORE_RETENTION_POLICY`
    /// (see [`RetentionPolicy::from_env`]); `sweep_interval`/`batch_size`
    /// keep their defaults.
    pub fn from_env() -> Self {
        Self {
            policy: RetentionPolicy::from_env(),
            ..Self::default()
        }
    }
}
