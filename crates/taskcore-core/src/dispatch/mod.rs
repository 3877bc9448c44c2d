//! Dispatcher: the dequeue engine workers poll (spec §4.2, C2).

use sqlx::PgPool;

use taskcore_db::models::Task;
use taskcore_db::queries::dispatch::{self, Capacity};

use crate::config::DispatchConfig;
use crate::error::{retry_on_conflict, CoreError, Result};
use crate::retention::RetentionPolicy;

/// Offered worker capacity. `cpu_cores = 0` or `memory_mb = 0` means the
/// worker has no room and the dispatcher returns `None` without a round
/// trip to the database (spec §8.3).
#[derive(Debug, Clone, Copy)]
pub struct WorkerCapacity {
    pub cpu_cores: i32,
    pub memory_mb: i64,
}

pub struct Dispatcher<'a> {
    pool: &'a PgPool,
    config: DispatchConfig,
    retention_policy: RetentionPolicy,
}

impl<'a> Dispatcher<'a> {
    pub fn new(pool: &'a PgPool, config: DispatchConfig) -> Self {
        Self {
            pool,
            config,
            retention_policy: RetentionPolicy::default(),
        }
    }

    /// Override the policy used to stamp `expires_at` on the `dequeued`
    /// journal row this dispatcher writes.
    pub fn with_retention_policy(mut self, policy: RetentionPolicy) -> Self {
        self.retention_policy = policy;
        self
    }

    /// Claim the next eligible task for `worker_id`, retrying bounded
    /// `SerializationConflict`s from concurrent claim attempts (spec §5,
    /// §7). Returns `CoreError::DispatchUnavailable` if every attempt in
    /// the bound is exhausted by contention.
    pub async fn dequeue(
        &self,
        worker_id: &str,
        process_pid: Option<i64>,
        capacity: WorkerCapacity,
    ) -> Result<Option<Task>> {
        if capacity.cpu_cores == 0 || capacity.memory_mb == 0 {
            return Ok(None);
        }

        let capacity = Capacity {
            cpu_cores: Some(capacity.cpu_cores),
            memory_mb: Some(capacity.memory_mb),
        };

        let result = retry_on_conflict(self.config.max_claim_attempts, || async {
            dispatch::dequeue_candidate(self.pool, worker_id, process_pid, capacity)
                .await
                .map_err(CoreError::from)
        })
        .await;

        match result {
            Ok(task) => {
                if let Some(task) = &task {
                    crate::journal::log_dequeued(self.pool, self.retention_policy, task.id, worker_id).await?;
                    tracing::info!(task_id = %task.id, worker_id, "task dequeued");
                }
                Ok(task)
            }
            Err(CoreError::Store(taskcore_db::StoreError::SerializationConflict { .. })) => {
                Err(CoreError::DispatchUnavailable {
                    attempts: self.config.max_claim_attempts,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Approximate queue depth, for dispatcher backpressure decisions.
    /// Racy by construction (spec §4.2): a concurrent dispatcher may
    /// claim the counted tasks before this dispatcher acts on the number.
    pub async fn eligible_count(&self) -> Result<i64> {
        Ok(dispatch::eligible_count(self.pool).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_short_circuits() {
        // Exercised end-to-end in taskcore-core/tests/dispatch_test.rs;
        // this just documents the contract for readers of this module.
        let capacity = WorkerCapacity { cpu_cores: 0, memory_mb: 16384 };
        assert_eq!(capacity.cpu_cores, 0);
    }
}
