//! `taskcore dead-letter <subcommand>`: quarantine inspection
//! (spec §4.4, §6.1, component C4). Dead-letter records are read-only
//! evidence, not rerun -- there is no requeue path here.

use anyhow::Result;
use sqlx::PgPool;

use taskcore_db::queries::dead_letter;

use crate::submit_cmd::parse_task_id;

pub async fn run_list(pool: &PgPool, limit: i64) -> Result<()> {
    let records = dead_letter::list(pool, limit, 0).await?;

    if records.is_empty() {
        println!("No dead-lettered tasks.");
        return Ok(());
    }

    println!("{:<38} {:<38} {:<10}", "DEAD-LETTER ID", "ORIGINAL TASK ID", "CREATED");
    for record in &records {
        println!(
            "{:<38} {:<38} {}",
            record.id,
            record.original_task_id,
            record.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );
    }

    Ok(())
}

pub async fn run_show(pool: &PgPool, dead_letter_id: &str) -> Result<()> {
    let id = parse_task_id(dead_letter_id)?;
    let record = dead_letter::get_by_id(pool, id).await?;

    println!("Dead-letter record: {}", record.id);
    println!("Original task: {}", record.original_task_id);
    println!("Failure reason: {}", record.failure_reason);
    println!("Created: {}", record.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();
    println!("Frozen task snapshot:");
    println!("{}", serde_json::to_string_pretty(&record.task_data)?);

    Ok(())
}
