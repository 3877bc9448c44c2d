//! Integration tests for `queries::tasks`.

use taskcore_db::error::StoreError;
use taskcore_db::models::{TaskPriority, TaskStatus};
use taskcore_db::queries::tasks::{self, NewTask};

use taskcore_test_utils::{create_test_db, drop_test_db};

fn sample_task() -> NewTask {
    NewTask {
        task_type: "debate.turn".to_string(),
        task_name: "generate opening statement".to_string(),
        priority: TaskPriority::Normal,
        max_retries: 3,
        ..Default::default()
    }
}

#[tokio::test]
async fn create_assigns_pending_status_and_defaults() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(&pool, &sample_task())
        .await
        .expect("create should succeed");

    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.retry_count, 0);
    assert_eq!(task.progress, 0.0);
    assert!(task.worker_id.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn create_rejects_negative_max_retries() {
    let (pool, db_name) = create_test_db().await;

    let mut new = sample_task();
    new.max_retries = -1;

    let err = tasks::create(&pool, &new).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn get_by_id_returns_not_found_for_unknown_task() {
    let (pool, db_name) = create_test_db().await;

    let err = tasks::get_by_id(&pool, uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn update_status_rejects_illegal_transition() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(&pool, &sample_task()).await.unwrap();

    let err = tasks::update_status(&pool, task.id, TaskStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition { .. }));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn update_status_allows_pending_to_running() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(&pool, &sample_task()).await.unwrap();

    let updated = tasks::update_status(&pool, task.id, TaskStatus::Running)
        .await
        .expect("pending -> running is legal");
    assert_eq!(updated.status, TaskStatus::Running);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn update_progress_rejects_regression_while_running() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(&pool, &sample_task()).await.unwrap();
    tasks::update_status(&pool, task.id, TaskStatus::Running)
        .await
        .unwrap();
    tasks::update_progress(&pool, task.id, 50.0, None).await.unwrap();

    let err = tasks::update_progress(&pool, task.id, 10.0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn update_rejects_progress_regression_while_running() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(&pool, &sample_task()).await.unwrap();
    tasks::update_status(&pool, task.id, TaskStatus::Running)
        .await
        .unwrap();
    tasks::update_progress(&pool, task.id, 50.0, None).await.unwrap();

    let mut regressed = tasks::get_by_id(&pool, task.id).await.unwrap();
    regressed.progress = 10.0;

    let err = tasks::update(&pool, &regressed).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn update_heartbeat_is_idempotent() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(&pool, &sample_task()).await.unwrap();
    tasks::update_heartbeat(&pool, task.id).await.unwrap();
    tasks::update_heartbeat(&pool, task.id).await.unwrap();

    let refreshed = tasks::get_by_id(&pool, task.id).await.unwrap();
    assert!(refreshed.last_heartbeat.is_some());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn soft_delete_hides_task_from_pending_queue_but_not_get_by_id() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(&pool, &sample_task()).await.unwrap();
    tasks::soft_delete(&pool, task.id).await.unwrap();

    let pending = tasks::get_pending_tasks(&pool, 10).await.unwrap();
    assert!(!pending.iter().any(|t| t.id == task.id));

    let fetched = tasks::get_by_id(&pool, task.id).await.unwrap();
    assert!(fetched.deleted_at.is_some());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn get_pending_tasks_orders_by_priority_then_creation() {
    let (pool, db_name) = create_test_db().await;

    let mut low = sample_task();
    low.priority = TaskPriority::Low;
    let low = tasks::create(&pool, &low).await.unwrap();

    let mut critical = sample_task();
    critical.priority = TaskPriority::Critical;
    let critical = tasks::create(&pool, &critical).await.unwrap();

    let pending = tasks::get_pending_tasks(&pool, 10).await.unwrap();
    let low_idx = pending.iter().position(|t| t.id == low.id).unwrap();
    let critical_idx = pending.iter().position(|t| t.id == critical.id).unwrap();
    assert!(critical_idx < low_idx, "critical priority must dequeue before low");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn count_by_status_reflects_inserted_tasks() {
    let (pool, db_name) = create_test_db().await;

    tasks::create(&pool, &sample_task()).await.unwrap();
    tasks::create(&pool, &sample_task()).await.unwrap();

    let counts = tasks::count_by_status(&pool).await.unwrap();
    assert_eq!(counts.pending, 2);
    assert_eq!(counts.total, 2);

    pool.close().await;
    drop_test_db(&db_name).await;
}
