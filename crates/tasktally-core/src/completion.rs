//! Completion log records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::TaskStatus;

/// Suffix appended to the display name of a soft-deleted task.
pub const DELETED_SUFFIX: &str = " (deleted)";

/// One completion event. `points` is the task's value when it was completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub id: i64,
    pub task_id: i64,
    pub completed_at: DateTime<Utc>,
    pub points: i64,
    /// Display name of the owning task, annotated when it was deleted.
    pub task_name: String,
    /// `None` when the task row no longer exists.
    pub task_status: Option<TaskStatus>,
}

/// Display name for a completion's task as resolved by the history join.
pub fn display_task_name(task_id: i64, name: Option<&str>, status: Option<TaskStatus>) -> String {
    match (name, status) {
        (Some(name), Some(TaskStatus::Deleted)) => format!("{name}{DELETED_SUFFIX}"),
        (Some(name), _) => name.to_string(),
        (None, _) => format!("unknown task #{task_id}"),
    }
}

/// Totals over the completion log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSummary {
    pub total_completions: u64,
    pub total_points: i64,
    pub today_completions: u64,
    pub today_points: i64,
}
