//! Integration tests for `taskcore_core::state`.

use taskcore_core::retention::RetentionPolicy;
use taskcore_core::state;
use taskcore_db::models::{TaskPriority, TaskStatus};
use taskcore_db::queries::dispatch::{self, Capacity};
use taskcore_db::queries::tasks::{self, NewTask};

use taskcore_test_utils::{create_test_db, drop_test_db};

fn sample_task() -> NewTask {
    NewTask {
        task_type: "debate.turn".to_string(),
        task_name: "opening statement".to_string(),
        priority: TaskPriority::Normal,
        max_retries: 3,
        ..Default::default()
    }
}

#[tokio::test]
async fn submit_creates_pending_task_and_journal_entry() {
    let (pool, db_name) = create_test_db().await;

    let task = state::submit(&pool, &sample_task(), RetentionPolicy::default()).await.unwrap();
    assert_eq!(task.status, TaskStatus::Pending);

    let history = taskcore_core::journal::get_task_history(&pool, task.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].event_type, "created");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn complete_requires_running_status() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(&pool, &sample_task()).await.unwrap();

    let err = state::complete(&pool, task.id, RetentionPolicy::default()).await.unwrap_err();
    assert!(matches!(
        err,
        taskcore_core::CoreError::Store(taskcore_db::StoreError::InvalidTransition { .. })
    ));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn dequeue_then_complete_full_lifecycle() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(&pool, &sample_task()).await.unwrap();
    let claimed = dispatch::dequeue_candidate(&pool, "worker-1", None, Capacity::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, task.id);

    let completed = state::complete(&pool, task.id, RetentionPolicy::default()).await.unwrap();
    assert_eq!(completed.status, TaskStatus::Completed);
    assert!(completed.completed_at.is_some());

    let history = taskcore_core::journal::get_task_history(&pool, task.id).await.unwrap();
    let types: Vec<&str> = history.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec!["created", "completed"]);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn cancel_from_running_is_legal() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(&pool, &sample_task()).await.unwrap();
    dispatch::dequeue_candidate(&pool, "worker-1", None, Capacity::default())
        .await
        .unwrap();

    let cancelled = state::cancel(&pool, task.id, RetentionPolicy::default()).await.unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn pause_and_resume_round_trip() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(&pool, &sample_task()).await.unwrap();
    dispatch::dequeue_candidate(&pool, "worker-1", None, Capacity::default())
        .await
        .unwrap();

    let paused = state::pause(&pool, task.id).await.unwrap();
    assert_eq!(paused.status, TaskStatus::Paused);

    let resumed = state::resume(&pool, task.id).await.unwrap();
    assert_eq!(resumed.status, TaskStatus::Running);

    pool.close().await;
    drop_test_db(&db_name).await;
}
