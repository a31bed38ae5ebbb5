use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a queued task.
///
/// `Leased` ⇔ `leased_until > now` ∧ `leased_by = Some(_)` is maintained by
/// [`crate::TaskQueue`]; `Completed` and `Failed` are terminal and never
/// transition further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Leased,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Leased => "leased",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "leased" => TaskStatus::Leased,
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            _ => TaskStatus::Pending,
        }
    }
}

/// A unit of work routed to exactly one consumer (`agent_id`) at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub agent_id: String,
    pub payload: serde_json::Value,
    pub status: TaskStatus,
    pub leased_until: Option<DateTime<Utc>>,
    pub leased_by: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(task_id: String, agent_id: String, payload: serde_json::Value, max_attempts: u32) -> Self {
        let now = Utc::now();
        Task {
            task_id,
            agent_id,
            payload,
            status: TaskStatus::Pending,
            leased_until: None,
            leased_by: None,
            result: None,
            error: None,
            attempts: 0,
            max_attempts,
            created_at: now,
            completed_at: None,
            updated_at: now,
        }
    }
}
