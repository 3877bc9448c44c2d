//! Exponential backoff math for task retries.
//!
//! Pure function, no I/O, so it is exhaustively unit tested here rather
//! than through the database-backed integration tests.

use std::time::Duration;

/// Compute the delay before the next retry attempt.
///
/// `base_delay_seconds` is the task's configured `retry_delay_seconds`;
/// `retry_count` is the number of attempts already made (0-indexed);
/// `max_retries` caps the exponent so a task with a large retry budget
/// does not end up waiting days between attempts.
///
/// Per spec §4.4: `delay = base * 2^retry_count`, capped at
/// `base * 2^max_retries`.
pub fn next_delay(base_delay_seconds: i64, retry_count: i32, max_retries: i32) -> Duration {
    let base = base_delay_seconds.max(0) as u64;
    let exponent = retry_count.clamp(0, max_retries.max(0)) as u32;
    let cap_exponent = max_retries.max(0) as u32;

    let delay_seconds = base.saturating_mul(1u64.checked_shl(exponent).unwrap_or(u64::MAX));
    let cap_seconds = base.saturating_mul(1u64.checked_shl(cap_exponent).unwrap_or(u64::MAX));

    Duration::from_secs(delay_seconds.min(cap_seconds))
}
