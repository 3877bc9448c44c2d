//! Typed errors for the orchestration layer.

use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

/// Errors raised by `taskcore-core` components.
///
/// Wraps [`taskcore_db::StoreError`] for storage failures and adds
/// errors specific to scheduling, retry, and liveness decisions that
/// have no direct storage counterpart.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Store(#[from] taskcore_db::StoreError),

    #[error("dispatcher unavailable after {attempts} attempts contending for a task slot")]
    DispatchUnavailable { attempts: u32 },

    #[error("task {id} exceeded its deadline")]
    DeadlineExceeded { id: Uuid },

    #[error("operation on task {id} cancelled")]
    Cancelled { id: Uuid },
}

impl CoreError {
    /// Whether retrying the operation that produced this error, unchanged,
    /// has a reasonable chance of succeeding. Mirrors
    /// [`taskcore_db::StoreError::is_retryable`] for the storage case.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::DispatchUnavailable { .. } => true,
            Self::DeadlineExceeded { .. } | Self::Cancelled { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Retry `op` while it fails with a retryable [`CoreError`], up to
/// `max_attempts` total tries, sleeping a capped exponential backoff
/// between attempts (spec §5: bounded at 3 attempts, ~100ms cap).
///
/// Non-retryable errors and the final attempt's error are returned
/// immediately.
pub async fn retry_on_conflict<T, F, Fut>(max_attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && err.is_retryable() => {
                let backoff = Duration::from_millis(10 * 2u64.pow(attempt.min(4))).min(Duration::from_millis(100));
                tokio::time::sleep(backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}
