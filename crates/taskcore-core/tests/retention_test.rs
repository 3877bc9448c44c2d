//! Integration tests for `taskcore_core::retention`.

use taskcore_core::config::RetentionConfig;
use taskcore_core::journal;
use taskcore_core::retention::{self, RetentionPolicy};
use taskcore_db::queries::tasks::{self, NewTask};

use taskcore_test_utils::{create_test_db, drop_test_db};

fn sample_task() -> NewTask {
    NewTask {
        task_type: "debate.turn".to_string(),
        task_name: "retention test task".to_string(),
        ..Default::default()
    }
}

#[test]
fn retention_time_takes_precedence_when_combined_with_days() {
    // Per spec §4.6: when both a day count and an explicit duration could
    // apply, the explicit duration wins. Modeled here as the caller
    // choosing `RetentionTime` over `RetentionDays` rather than the enum
    // holding both simultaneously -- the two are mutually exclusive
    // variants by construction.
    let now = chrono::Utc::now();
    let days_expiry = RetentionPolicy::RetentionDays(30).expires_at_for(now).unwrap();
    let time_expiry = RetentionPolicy::RetentionTime(std::time::Duration::from_secs(3600))
        .expires_at_for(now)
        .unwrap();
    assert!(time_expiry < days_expiry);
}

#[tokio::test]
async fn tick_deletes_expired_rows_in_batches() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(&pool, &sample_task()).await.unwrap();
    for i in 0..12 {
        taskcore_db::queries::journal::log_event(
            &pool,
            task.id,
            &format!("event_{i}"),
            &serde_json::json!({}),
            None,
            Some(chrono::Utc::now() - chrono::Duration::hours(1)),
        )
        .await
        .unwrap();
    }

    let config = RetentionConfig {
        sweep_interval: std::time::Duration::from_secs(3600),
        batch_size: 5,
    };
    let deleted = retention::tick(&pool, &config).await.unwrap();
    assert_eq!(deleted, 12, "tick should drain the full backlog across multiple batches");

    let remaining = journal::get_log_count(&pool).await.unwrap();
    assert_eq!(remaining, 0);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn tick_leaves_unexpired_rows_alone() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(&pool, &sample_task()).await.unwrap();
    taskcore_db::queries::journal::log_event(
        &pool,
        task.id,
        "fresh",
        &serde_json::json!({}),
        None,
        Some(chrono::Utc::now() + chrono::Duration::days(30)),
    )
    .await
    .unwrap();

    let deleted = retention::tick(&pool, &RetentionConfig::default()).await.unwrap();
    assert_eq!(deleted, 0);

    let remaining = journal::get_log_count(&pool).await.unwrap();
    assert_eq!(remaining, 1);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn run_reaper_loop_stops_on_cancellation() {
    let (pool, db_name) = create_test_db().await;

    let cancel = tokio_util::sync::CancellationToken::new();
    let cancel_clone = cancel.clone();
    let config = RetentionConfig {
        sweep_interval: std::time::Duration::from_millis(50),
        batch_size: 10,
    };
    let handle = tokio::spawn(async move {
        retention::run_reaper_loop(&pool, config, cancel_clone).await;
    });

    cancel.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(2), handle)
        .await
        .expect("loop should stop promptly after cancellation")
        .unwrap();

    drop_test_db(&db_name).await;
}
