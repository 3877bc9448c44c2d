use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of a task. String values are part of the wire/schema contract
/// (spec §6.3) and must remain exactly as listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Queued,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
    DeadLetter,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::DeadLetter => "dead_letter",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "dead_letter" => Ok(Self::DeadLetter),
            other => Err(TaskStatusParseError(other.to_owned())),
        }
    }
}

impl TaskStatus {
    /// Terminal statuses have no outbound transitions (spec invariant P3).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::DeadLetter)
    }

    /// Whether `from -> to` is an edge in the state graph (spec §3.3).
    ///
    /// ```text
    /// pending   -> queued | running | cancelled
    /// queued    -> running | pending | cancelled
    /// running   -> paused | completed | failed | cancelled
    /// paused    -> running | cancelled
    /// failed    -> pending (retry)  | dead_letter (exhausted)
    /// completed, cancelled, dead_letter: terminal, no outbound edges
    /// ```
    pub fn is_valid_transition(from: TaskStatus, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (from, to),
            (Pending, Queued)
                | (Pending, Running)
                | (Pending, Cancelled)
                | (Queued, Running)
                | (Queued, Pending)
                | (Queued, Cancelled)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Paused, Running)
                | (Paused, Cancelled)
                | (Failed, Pending)
                | (Failed, DeadLetter)
        )
    }
}

/// Error returned when parsing an invalid [`TaskStatus`] string.
#[derive(Debug, Clone)]
pub struct TaskStatusParseError(pub String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task status: {:?}", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

// ---------------------------------------------------------------------------

/// Dispatch priority. Ordered critical (0) .. background (4); derives `Ord`
/// in declaration order so `sort()` / `min()` give the dispatch order
/// directly (spec §4.2 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Critical,
    High,
    Normal,
    Low,
    Background,
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
            Self::Background => "background",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskPriority {
    type Err = TaskPriorityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "normal" => Ok(Self::Normal),
            "low" => Ok(Self::Low),
            "background" => Ok(Self::Background),
            other => Err(TaskPriorityParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TaskPriority`] string.
#[derive(Debug, Clone)]
pub struct TaskPriorityParseError(pub String);

impl fmt::Display for TaskPriorityParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task priority: {:?}", self.0)
    }
}

impl std::error::Error for TaskPriorityParseError {}

// ---------------------------------------------------------------------------
// JSON payload types
// ---------------------------------------------------------------------------

/// Recognized task configuration options (spec §3.2).
///
/// Unknown keys are rejected at deserialization: the config shape is part
/// of the schema contract, not a free-form blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    pub timeout_seconds: Option<i64>,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: i64,
    #[serde(default = "default_stuck_threshold")]
    pub stuck_threshold_seconds: i64,
    #[serde(default)]
    pub allow_pause: bool,
    #[serde(default = "default_true")]
    pub allow_cancel: bool,
    #[serde(default)]
    pub endless: bool,
    pub graceful_shutdown_seconds: Option<i64>,
    #[serde(default)]
    pub capture_output: bool,
    #[serde(default)]
    pub capture_stderr: bool,
}

fn default_heartbeat_interval() -> i64 {
    30
}

fn default_stuck_threshold() -> i64 {
    90
}

fn default_true() -> bool {
    true
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: None,
            heartbeat_interval_seconds: default_heartbeat_interval(),
            stuck_threshold_seconds: default_stuck_threshold(),
            allow_pause: false,
            allow_cancel: true,
            endless: false,
            graceful_shutdown_seconds: None,
            capture_output: false,
            capture_stderr: false,
        }
    }
}

/// A single error record appended to a task's `error_history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: String,
    pub message: Option<String>,
    pub at: DateTime<Utc>,
}

/// A webhook the notification subsystem should call on task events.
/// Read-only from the core's perspective (spec §6.2).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WebhookTarget {
    pub url: String,
    #[serde(default)]
    pub events: Vec<String>,
}

/// Consumer-visible notification configuration. Never written by the core.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub webhooks: Vec<WebhookTarget>,
    #[serde(default)]
    pub event_channels: Vec<String>,
}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A task -- the unit of scheduling (spec §3.1).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub task_type: String,
    pub task_name: String,
    pub correlation_id: Option<String>,
    pub parent_task_id: Option<Uuid>,
    pub payload: Vec<u8>,
    pub config: Json<TaskConfig>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub progress: f64,
    pub progress_message: Option<String>,
    pub checkpoint: Option<Vec<u8>>,
    pub max_retries: i32,
    pub retry_count: i32,
    pub retry_delay_seconds: i64,
    pub last_error: Option<String>,
    pub error_history: Json<Vec<ErrorRecord>>,
    pub worker_id: Option<String>,
    pub process_pid: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub required_cpu_cores: i32,
    pub required_memory_mb: i64,
    pub estimated_duration_seconds: Option<i64>,
    pub actual_duration_seconds: Option<i64>,
    pub notification_config: Json<NotificationConfig>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A per-task resource usage sample (spec §3.4). Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResourceSnapshot {
    pub id: i64,
    pub task_id: Uuid,
    pub cpu_percent: f64,
    pub cpu_user_seconds: f64,
    pub cpu_system_seconds: f64,
    pub memory_rss_bytes: i64,
    pub memory_vms_bytes: i64,
    pub memory_percent: f64,
    pub io_read_bytes: i64,
    pub io_write_bytes: i64,
    pub io_read_count: i64,
    pub io_write_count: i64,
    pub net_bytes_sent: i64,
    pub net_bytes_recv: i64,
    pub open_connections: i32,
    pub open_files: i32,
    pub open_fds: i32,
    pub thread_count: i32,
    pub process_state: Option<String>,
    pub sampled_at: DateTime<Utc>,
}

/// A single execution-history event (spec §3.5). Append-only, subject to
/// retention (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExecutionHistoryEvent {
    pub id: i64,
    pub task_id: Uuid,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A frozen copy of a task that exhausted its retry budget (spec §3.6).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeadLetterRecord {
    pub id: Uuid,
    pub original_task_id: Uuid,
    pub task_data: serde_json::Value,
    pub failure_reason: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_display_roundtrip() {
        let variants = [
            TaskStatus::Pending,
            TaskStatus::Queued,
            TaskStatus::Running,
            TaskStatus::Paused,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
            TaskStatus::DeadLetter,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: TaskStatus = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn task_status_wire_values() {
        assert_eq!(TaskStatus::DeadLetter.to_string(), "dead_letter");
        assert_eq!(TaskStatus::Pending.to_string(), "pending");
    }

    #[test]
    fn task_status_invalid() {
        assert!("nope".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn task_status_terminal() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(TaskStatus::DeadLetter.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
    }

    #[test]
    fn task_priority_display_roundtrip() {
        let variants = [
            TaskPriority::Critical,
            TaskPriority::High,
            TaskPriority::Normal,
            TaskPriority::Low,
            TaskPriority::Background,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: TaskPriority = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn task_status_transition_graph() {
        assert!(TaskStatus::is_valid_transition(
            TaskStatus::Pending,
            TaskStatus::Running
        ));
        assert!(TaskStatus::is_valid_transition(
            TaskStatus::Failed,
            TaskStatus::Pending
        ));
        assert!(TaskStatus::is_valid_transition(
            TaskStatus::Failed,
            TaskStatus::DeadLetter
        ));
        assert!(!TaskStatus::is_valid_transition(
            TaskStatus::Completed,
            TaskStatus::Pending
        ));
        assert!(!TaskStatus::is_valid_transition(
            TaskStatus::DeadLetter,
            TaskStatus::Pending
        ));
        assert!(!TaskStatus::is_valid_transition(
            TaskStatus::Pending,
            TaskStatus::Paused
        ));
    }

    #[test]
    fn task_priority_invalid() {
        assert!("urgent".parse::<TaskPriority>().is_err());
    }

    #[test]
    fn task_priority_orders_critical_first() {
        let mut priorities = vec![
            TaskPriority::Low,
            TaskPriority::Critical,
            TaskPriority::Normal,
            TaskPriority::Background,
            TaskPriority::High,
        ];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![
                TaskPriority::Critical,
                TaskPriority::High,
                TaskPriority::Normal,
                TaskPriority::Low,
                TaskPriority::Background,
            ]
        );
    }

    #[test]
    fn task_config_default() {
        let cfg = TaskConfig::default();
        assert_eq!(cfg.heartbeat_interval_seconds, 30);
        assert_eq!(cfg.stuck_threshold_seconds, 90);
        assert!(cfg.allow_cancel);
        assert!(!cfg.endless);
    }

    #[test]
    fn task_config_rejects_unknown_fields() {
        let raw = r#"{"timeout_seconds": 10, "bogus_field": true}"#;
        let result: Result<TaskConfig, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }

    #[test]
    fn task_config_roundtrip() {
        let cfg = TaskConfig {
            timeout_seconds: Some(120),
            ..Default::default()
        };
        let s = serde_json::to_string(&cfg).unwrap();
        let parsed: TaskConfig = serde_json::from_str(&s).unwrap();
        assert_eq!(cfg, parsed);
    }
}
