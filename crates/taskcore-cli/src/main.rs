mod config;
mod dead_letter_cmd;
mod history_cmd;
mod liveness_cmd;
mod reap_cmd;
mod status_cmd;
mod submit_cmd;
mod worker_cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};

use config::TaskcoreConfig;
use submit_cmd::SubmitArgs;
use taskcore_db::pool;

#[derive(Parser)]
#[command(name = "taskcore", about = "Durable background-task execution core")]
struct Cli {
    /// Database URL (overrides TASKCORE_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a taskcore config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/taskcore")]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the taskcore database (create + migrate)
    DbInit,
    /// Submit a new task (producer role)
    Submit {
        /// Dispatch key, e.g. "debate.turn"
        task_type: String,
        /// Human label for the task
        task_name: String,
        #[arg(long, default_value = "normal")]
        priority: String,
        /// Payload as a UTF-8 string (worker-interpreted)
        #[arg(long)]
        payload: Option<String>,
        #[arg(long, default_value_t = 3)]
        max_retries: i32,
        #[arg(long, default_value_t = 5)]
        retry_delay_seconds: i64,
        #[arg(long, default_value_t = 0)]
        cpu_cores: i32,
        #[arg(long, default_value_t = 0)]
        memory_mb: i64,
        #[arg(long)]
        correlation_id: Option<String>,
        #[arg(long)]
        parent_task_id: Option<String>,
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        session_id: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Delay admission eligibility by this many seconds
        #[arg(long)]
        delay_seconds: Option<i64>,
    },
    /// Worker-facing commands: dequeue, heartbeat, progress, checkpoint,
    /// complete, fail, cancel
    Worker {
        #[command(subcommand)]
        command: WorkerCommands,
    },
    /// Show aggregate task counts, or detail for one task
    Status {
        /// Task ID to show detail for (omit for aggregate counts)
        task_id: Option<String>,
    },
    /// Show execution-history events for a task
    History {
        task_id: String,
    },
    /// Show resource usage snapshots for a task
    Snapshots {
        task_id: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Dead-letter queue inspection and recovery
    DeadLetter {
        #[command(subcommand)]
        command: DeadLetterCommands,
    },
    /// Liveness monitor (C3): reclaim stale running tasks
    Liveness {
        #[command(subcommand)]
        command: LoopCommands,
    },
    /// Retention reaper (C6): delete expired execution-history rows
    Reap {
        #[command(subcommand)]
        command: LoopCommands,
    },
}

#[derive(Subcommand)]
enum WorkerCommands {
    /// Claim the next eligible task
    Dequeue {
        #[arg(long)]
        worker_id: String,
        #[arg(long)]
        cpu_cores: i32,
        #[arg(long)]
        memory_mb: i64,
        #[arg(long)]
        pid: Option<i64>,
    },
    /// Record a heartbeat for a claimed task
    Heartbeat { task_id: String },
    /// Report progress for a claimed task
    Progress {
        task_id: String,
        progress: f64,
        #[arg(long)]
        message: Option<String>,
    },
    /// Persist checkpoint bytes for a claimed task
    Checkpoint { task_id: String, data: String },
    /// Mark a task complete
    Complete { task_id: String },
    /// Report a task failure (retry or dead-letter per policy)
    Fail {
        task_id: String,
        #[arg(long, default_value = "worker_error")]
        kind: String,
        #[arg(long)]
        message: Option<String>,
    },
    /// Cancel a task
    Cancel { task_id: String },
    /// List tasks currently claimed by a worker
    Claimed { worker_id: String },
}

#[derive(Subcommand)]
enum DeadLetterCommands {
    /// List dead-lettered tasks
    List {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Show a dead-letter record's frozen task snapshot
    Show { dead_letter_id: String },
}

#[derive(Subcommand)]
enum LoopCommands {
    /// Run a single sweep and exit
    Once,
    /// Run forever on the component's tick interval until Ctrl+C
    Loop,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_url, force } => cmd_init(&db_url, force)?,
        Commands::DbInit => cmd_db_init(cli.database_url.as_deref()).await?,
        Commands::Submit {
            task_type,
            task_name,
            priority,
            payload,
            max_retries,
            retry_delay_seconds,
            cpu_cores,
            memory_mb,
            correlation_id,
            parent_task_id,
            user_id,
            session_id,
            tags,
            delay_seconds,
        } => {
            let db_pool = connect(cli.database_url.as_deref()).await?;
            let result = submit_cmd::run_submit(
                &db_pool,
                SubmitArgs {
                    task_type,
                    task_name,
                    priority,
                    payload,
                    max_retries,
                    retry_delay_seconds,
                    cpu_cores,
                    memory_mb,
                    correlation_id,
                    parent_task_id,
                    user_id,
                    session_id,
                    tags,
                    scheduled_in_seconds: delay_seconds,
                },
            )
            .await;
            db_pool.close().await;
            result?;
        }
        Commands::Worker { command } => {
            let db_pool = connect(cli.database_url.as_deref()).await?;
            let result = run_worker_command(&db_pool, command).await;
            db_pool.close().await;
            result?;
        }
        Commands::Status { task_id } => {
            let db_pool = connect(cli.database_url.as_deref()).await?;
            let result = status_cmd::run_status(&db_pool, task_id.as_deref()).await;
            db_pool.close().await;
            result?;
        }
        Commands::History { task_id } => {
            let db_pool = connect(cli.database_url.as_deref()).await?;
            let result = history_cmd::run_history(&db_pool, &task_id).await;
            db_pool.close().await;
            result?;
        }
        Commands::Snapshots { task_id, limit } => {
            let db_pool = connect(cli.database_url.as_deref()).await?;
            let result = history_cmd::run_snapshots(&db_pool, &task_id, limit).await;
            db_pool.close().await;
            result?;
        }
        Commands::DeadLetter { command } => {
            let db_pool = connect(cli.database_url.as_deref()).await?;
            let result = run_dead_letter_command(&db_pool, command).await;
            db_pool.close().await;
            result?;
        }
        Commands::Liveness { command } => {
            let db_pool = connect(cli.database_url.as_deref()).await?;
            let result = match command {
                LoopCommands::Once => liveness_cmd::run_once(&db_pool).await,
                LoopCommands::Loop => liveness_cmd::run_loop(&db_pool).await,
            };
            db_pool.close().await;
            result?;
        }
        Commands::Reap { command } => {
            let db_pool = connect(cli.database_url.as_deref()).await?;
            let result = match command {
                LoopCommands::Once => reap_cmd::run_once(&db_pool).await,
                LoopCommands::Loop => reap_cmd::run_loop(&db_pool).await,
            };
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}

async fn run_worker_command(db_pool: &sqlx::PgPool, command: WorkerCommands) -> Result<()> {
    match command {
        WorkerCommands::Dequeue {
            worker_id,
            cpu_cores,
            memory_mb,
            pid,
        } => worker_cmd::run_dequeue(db_pool, &worker_id, cpu_cores, memory_mb, pid).await,
        WorkerCommands::Heartbeat { task_id } => worker_cmd::run_heartbeat(db_pool, &task_id).await,
        WorkerCommands::Progress {
            task_id,
            progress,
            message,
        } => worker_cmd::run_progress(db_pool, &task_id, progress, message.as_deref()).await,
        WorkerCommands::Checkpoint { task_id, data } => {
            worker_cmd::run_checkpoint(db_pool, &task_id, &data).await
        }
        WorkerCommands::Complete { task_id } => worker_cmd::run_complete(db_pool, &task_id).await,
        WorkerCommands::Fail {
            task_id,
            kind,
            message,
        } => worker_cmd::run_fail(db_pool, &task_id, &kind, message.as_deref()).await,
        WorkerCommands::Cancel { task_id } => worker_cmd::run_cancel(db_pool, &task_id).await,
        WorkerCommands::Claimed { worker_id } => worker_cmd::run_claimed(db_pool, &worker_id).await,
    }
}

async fn run_dead_letter_command(db_pool: &sqlx::PgPool, command: DeadLetterCommands) -> Result<()> {
    match command {
        DeadLetterCommands::List { limit } => dead_letter_cmd::run_list(db_pool, limit).await,
        DeadLetterCommands::Show { dead_letter_id } => {
            dead_letter_cmd::run_show(db_pool, &dead_letter_id).await
        }
    }
}

/// Resolve config and open a pool -- the common path shared by every
/// subcommand except `init`.
async fn connect(cli_db_url: Option<&str>) -> Result<sqlx::PgPool> {
    let resolved = TaskcoreConfig::resolve(cli_db_url)?;
    pool::create_pool(&resolved.db_config).await
}

/// Execute `taskcore init`: write config file.
fn cmd_init(db_url: &str, force: bool) -> Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
    };
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!();
    println!("Next: run `taskcore db-init` to create and migrate the database.");

    Ok(())
}

/// Execute `taskcore db-init`: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> Result<()> {
    let resolved = TaskcoreConfig::resolve(cli_db_url)?;

    println!("Initializing taskcore database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool, pool::default_migrations_path()).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;
    println!("taskcore db-init complete.");
    Ok(())
}
