//! Integration tests for the atomic dequeue used by the dispatcher.

use std::sync::Arc;

use taskcore_db::models::{TaskPriority, TaskStatus};
use taskcore_db::queries::dispatch::Capacity;
use taskcore_db::queries::tasks::NewTask;
use taskcore_db::queries::{dispatch, tasks};

use taskcore_test_utils::{create_test_db, drop_test_db};

fn sample_task(priority: TaskPriority) -> NewTask {
    NewTask {
        task_type: "debate.turn".to_string(),
        task_name: "generate rebuttal".to_string(),
        priority,
        max_retries: 3,
        ..Default::default()
    }
}

#[tokio::test]
async fn dequeue_claims_task_and_sets_worker_fields() {
    let (pool, db_name) = create_test_db().await;

    let task = tasks::create(&pool, &sample_task(TaskPriority::Normal))
        .await
        .unwrap();

    let claimed = dispatch::dequeue_candidate(&pool, "worker-1", Some(4242), Capacity::default())
        .await
        .unwrap()
        .expect("a pending task should be claimed");

    assert_eq!(claimed.id, task.id);
    assert_eq!(claimed.status, TaskStatus::Running);
    assert_eq!(claimed.worker_id.as_deref(), Some("worker-1"));
    assert_eq!(claimed.process_pid, Some(4242));
    assert!(claimed.started_at.is_some());
    assert!(claimed.last_heartbeat.is_some());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn dequeue_returns_none_when_queue_empty() {
    let (pool, db_name) = create_test_db().await;

    let claimed = dispatch::dequeue_candidate(&pool, "worker-1", None, Capacity::default())
        .await
        .unwrap();
    assert!(claimed.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn dequeue_prefers_higher_priority() {
    let (pool, db_name) = create_test_db().await;

    let low = tasks::create(&pool, &sample_task(TaskPriority::Low)).await.unwrap();
    let high = tasks::create(&pool, &sample_task(TaskPriority::High)).await.unwrap();

    let claimed = dispatch::dequeue_candidate(&pool, "worker-1", None, Capacity::default())
        .await
        .unwrap()
        .expect("should claim the higher priority task");

    assert_eq!(claimed.id, high.id);
    assert_ne!(claimed.id, low.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn concurrent_dequeues_never_double_claim() {
    let (pool, db_name) = create_test_db().await;
    let pool = Arc::new(pool);

    for _ in 0..8 {
        tasks::create(&pool, &sample_task(TaskPriority::Normal)).await.unwrap();
    }

    let mut handles = Vec::new();
    for i in 0..8 {
        let pool = Arc::clone(&pool);
        handles.push(tokio::spawn(async move {
            dispatch::dequeue_candidate(&pool, &format!("worker-{i}"), None, Capacity::default())
                .await
                .unwrap()
        }));
    }

    let mut claimed_ids = std::collections::HashSet::new();
    for handle in handles {
        if let Some(task) = handle.await.unwrap() {
            assert!(
                claimed_ids.insert(task.id),
                "the same task must never be claimed twice"
            );
        }
    }
    assert_eq!(claimed_ids.len(), 8, "all eight tasks should be claimed exactly once");

    pool.close().await;
    drop_test_db(&db_name).await;
}
