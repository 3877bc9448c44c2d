//! End-to-end scenarios S1-S6.

use taskcore_core::config::{DispatchConfig, LivenessConfig};
use taskcore_core::dispatch::{Dispatcher, WorkerCapacity};
use taskcore_core::liveness;
use taskcore_core::retention::RetentionPolicy;
use taskcore_core::retry;
use taskcore_db::models::{TaskPriority, TaskStatus};
use taskcore_db::queries::dead_letter;
use taskcore_db::queries::tasks::{self, NewTask};

use taskcore_test_utils::{create_test_db, drop_test_db};

fn unlimited_capacity() -> WorkerCapacity {
    WorkerCapacity { cpu_cores: i32::MAX, memory_mb: i64::MAX }
}

/// S1 - FIFO within priority.
#[tokio::test]
async fn s1_fifo_within_priority() {
    let (pool, db_name) = create_test_db().await;

    // Dequeue order ties break on `created_at`, so submission order alone
    // (not an explicit `scheduled_at`) is what this scenario exercises.
    let task1 = tasks::create(
        &pool,
        &NewTask {
            task_type: "t".into(),
            task_name: "task-1".into(),
            priority: TaskPriority::Normal,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let task2 = tasks::create(
        &pool,
        &NewTask {
            task_type: "t".into(),
            task_name: "task-2".into(),
            priority: TaskPriority::High,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let task3 = tasks::create(
        &pool,
        &NewTask {
            task_type: "t".into(),
            task_name: "task-3".into(),
            priority: TaskPriority::Normal,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let dispatcher = Dispatcher::new(&pool, DispatchConfig::default());
    let first = dispatcher.dequeue("w", None, unlimited_capacity()).await.unwrap().unwrap();
    let second = dispatcher.dequeue("w", None, unlimited_capacity()).await.unwrap().unwrap();
    let third = dispatcher.dequeue("w", None, unlimited_capacity()).await.unwrap().unwrap();

    assert_eq!(first.id, task2.id, "high priority dequeues first");
    assert_eq!(second.id, task1.id, "earlier normal task dequeues before later one");
    assert_eq!(third.id, task3.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

/// S2 - Resource admission.
#[tokio::test]
async fn s2_resource_admission() {
    let (pool, db_name) = create_test_db().await;

    let task_a = tasks::create(
        &pool,
        &NewTask {
            task_type: "t".into(),
            task_name: "task-a".into(),
            required_cpu_cores: 4,
            required_memory_mb: 8192,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let task_b = tasks::create(
        &pool,
        &NewTask {
            task_type: "t".into(),
            task_name: "task-b".into(),
            required_cpu_cores: 1,
            required_memory_mb: 1024,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let dispatcher = Dispatcher::new(&pool, DispatchConfig::default());
    let claimed = dispatcher
        .dequeue("w", None, WorkerCapacity { cpu_cores: 2, memory_mb: 4096 })
        .await
        .unwrap()
        .expect("task B fits the offered capacity");

    assert_eq!(claimed.id, task_b.id);

    let a_refreshed = tasks::get_by_id(&pool, task_a.id).await.unwrap();
    assert_eq!(a_refreshed.status, TaskStatus::Pending, "task A must remain pending");

    pool.close().await;
    drop_test_db(&db_name).await;
}

/// S3 - Retry then dead-letter.
#[tokio::test]
async fn s3_retry_then_dead_letter() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(
        &pool,
        &NewTask {
            task_type: "t".into(),
            task_name: "flaky".into(),
            max_retries: 2,
            retry_delay_seconds: 1,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let dispatcher = Dispatcher::new(&pool, DispatchConfig::default());

    for expected_retry_count in 1..=2 {
        let claimed = dispatcher
            .dequeue("w", None, unlimited_capacity())
            .await
            .unwrap()
            .expect("task should be eligible before its retry budget is exhausted");
        assert_eq!(claimed.status, TaskStatus::Running);

        tasks::append_error(&pool, task.id, "panic", Some("boom")).await.unwrap();
        tasks::update_status(&pool, task.id, TaskStatus::Failed).await.unwrap();

        let outcome = retry::handle_failure(&pool, task.id, "boom", RetentionPolicy::default()).await.unwrap();
        match outcome {
            retry::FailureOutcome::Rescheduled { task, .. } => {
                assert_eq!(task.status, TaskStatus::Pending);
                assert_eq!(task.retry_count, expected_retry_count);
                assert!(task.scheduled_at >= chrono::Utc::now());
            }
            other => panic!("expected Rescheduled at retry {expected_retry_count}, got {other:?}"),
        }

        // Bypass the real backoff delay so the next dequeue in this test
        // does not need to sleep.
        sqlx::query("UPDATE tasks SET scheduled_at = now() WHERE id = $1")
            .bind(task.id)
            .execute(&pool)
            .await
            .unwrap();
    }

    // Third failure: retry_count (2) == max_retries (2), dead-lettered.
    dispatcher.dequeue("w", None, unlimited_capacity()).await.unwrap();
    tasks::append_error(&pool, task.id, "panic", Some("final boom")).await.unwrap();
    tasks::update_status(&pool, task.id, TaskStatus::Failed).await.unwrap();

    let outcome = retry::handle_failure(&pool, task.id, "final boom", RetentionPolicy::default()).await.unwrap();
    assert!(matches!(outcome, retry::FailureOutcome::DeadLettered { .. }));

    let record = dead_letter::get_by_original_task_id(&pool, task.id).await.unwrap();
    assert_eq!(record[0].failure_reason, "final boom");

    pool.close().await;
    drop_test_db(&db_name).await;
}

/// S4 - Stall reclaim.
#[tokio::test]
async fn s4_stall_reclaim() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(
        &pool,
        &NewTask {
            task_type: "t".into(),
            task_name: "stalls".into(),
            max_retries: 1,
            retry_delay_seconds: 0,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let dispatcher = Dispatcher::new(&pool, DispatchConfig::default());
    dispatcher.dequeue("w", None, unlimited_capacity()).await.unwrap();
    tasks::update_heartbeat(&pool, task.id).await.unwrap();

    // Simulate the worker going silent by rewinding the heartbeat
    // instead of sleeping for the real threshold in this test.
    sqlx::query("UPDATE tasks SET last_heartbeat = now() - interval '6 seconds' WHERE id = $1")
        .bind(task.id)
        .execute(&pool)
        .await
        .unwrap();

    let config = LivenessConfig {
        check_interval: std::time::Duration::from_secs(1),
        heartbeat_timeout: chrono::Duration::seconds(5),
    };
    let reclaimed = liveness::tick(&pool, &config, RetentionPolicy::default()).await.unwrap();
    assert_eq!(reclaimed, 1);

    let refreshed = tasks::get_by_id(&pool, task.id).await.unwrap();
    assert_eq!(refreshed.status, TaskStatus::Pending);
    assert_eq!(refreshed.retry_count, 1);
    assert!(refreshed.worker_id.is_none());

    // Reset scheduled_at and simulate a second stall; no retries remain.
    sqlx::query("UPDATE tasks SET scheduled_at = now() WHERE id = $1")
        .bind(task.id)
        .execute(&pool)
        .await
        .unwrap();
    dispatcher.dequeue("w", None, unlimited_capacity()).await.unwrap();
    sqlx::query("UPDATE tasks SET last_heartbeat = now() - interval '6 seconds' WHERE id = $1")
        .bind(task.id)
        .execute(&pool)
        .await
        .unwrap();

    liveness::tick(&pool, &config, RetentionPolicy::default()).await.unwrap();
    let final_state = tasks::get_by_id(&pool, task.id).await.unwrap();
    assert_eq!(final_state.status, TaskStatus::DeadLetter);

    pool.close().await;
    drop_test_db(&db_name).await;
}

/// S5 - Cancellation during run.
#[tokio::test]
async fn s5_cancellation_during_run() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(
        &pool,
        &NewTask {
            task_type: "t".into(),
            task_name: "cancel me".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let dispatcher = Dispatcher::new(&pool, DispatchConfig::default());
    dispatcher.dequeue("w", None, unlimited_capacity()).await.unwrap();

    taskcore_core::state::cancel(&pool, task.id, RetentionPolicy::default()).await.unwrap();

    // Heartbeat from the worker is advisory and still succeeds.
    tasks::update_heartbeat(&pool, task.id).await.unwrap();

    let observed = tasks::get_by_id(&pool, task.id).await.unwrap();
    assert_eq!(observed.status, TaskStatus::Cancelled);

    pool.close().await;
    drop_test_db(&db_name).await;
}

/// S6 - Retention reaper.
#[tokio::test]
async fn s6_retention_reaper() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(
        &pool,
        &NewTask {
            task_type: "t".into(),
            task_name: "journal source".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let policy = RetentionPolicy::RetentionDays(1);
    for i in 0..10 {
        let expires_at = policy
            .expires_at_for(chrono::Utc::now() - chrono::Duration::hours(25))
            .unwrap();
        taskcore_db::queries::journal::log_event(
            &pool,
            task.id,
            &format!("event_{i}"),
            &serde_json::json!({}),
            None,
            Some(expires_at),
        )
        .await
        .unwrap();
    }

    let deleted = taskcore_core::retention::tick(&pool, &taskcore_core::config::RetentionConfig::default())
        .await
        .unwrap();
    assert_eq!(deleted, 10);

    let remaining = taskcore_core::journal::get_log_count(&pool).await.unwrap();
    assert_eq!(remaining, 0);

    let task_row = tasks::get_by_id(&pool, task.id).await.unwrap();
    assert_eq!(task_row.id, task.id, "task rows are untouched by the reaper");

    pool.close().await;
    drop_test_db(&db_name).await;
}
