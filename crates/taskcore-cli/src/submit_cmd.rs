//! `taskcore submit` command: create a task (producer role).

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use taskcore_db::models::{TaskConfig, TaskPriority};
use taskcore_db::queries::tasks::{self, NewTask};

/// Flags accepted by `taskcore submit`, already parsed from the CLI.
pub struct SubmitArgs {
    pub task_type: String,
    pub task_name: String,
    pub priority: String,
    pub payload: Option<String>,
    pub max_retries: i32,
    pub retry_delay_seconds: i64,
    pub cpu_cores: i32,
    pub memory_mb: i64,
    pub correlation_id: Option<String>,
    pub parent_task_id: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub tags: Vec<String>,
    pub scheduled_in_seconds: Option<i64>,
}

pub async fn run_submit(pool: &PgPool, args: SubmitArgs) -> Result<()> {
    let priority: TaskPriority = args
        .priority
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid priority: {}", args.priority))?;

    let parent_task_id = args
        .parent_task_id
        .as_deref()
        .map(Uuid::parse_str)
        .transpose()
        .context("invalid parent task id")?;

    let scheduled_at = args
        .scheduled_in_seconds
        .map(|secs| chrono::Utc::now() + chrono::Duration::seconds(secs));

    let new_task = NewTask {
        task_type: args.task_type,
        task_name: args.task_name,
        correlation_id: args.correlation_id,
        parent_task_id,
        payload: args.payload.map(String::into_bytes).unwrap_or_default(),
        config: TaskConfig::default(),
        priority,
        max_retries: args.max_retries,
        retry_delay_seconds: args.retry_delay_seconds,
        required_cpu_cores: args.cpu_cores,
        required_memory_mb: args.memory_mb,
        user_id: args.user_id,
        session_id: args.session_id,
        tags: args.tags,
        scheduled_at,
        ..Default::default()
    };

    let policy = taskcore_core::retention::RetentionPolicy::from_env();
    let task = taskcore_core::state::submit(pool, &new_task, policy).await?;

    println!("Submitted task {} ({})", task.id, task.task_name);
    println!("  type: {}", task.task_type);
    println!("  priority: {}", task.priority);
    println!("  status: {}", task.status);
    println!(
        "  scheduled_at: {}",
        task.scheduled_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    Ok(())
}

/// Convenience for commands that only need to resolve a raw id string.
pub fn parse_task_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid task ID: {raw}"))
}
