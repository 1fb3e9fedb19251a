//! Task model and validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Lifecycle state of a task. Transitions only `Active -> Deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Active,
    Deleted,
}

impl TaskStatus {
    pub(crate) fn from_deleted_flag(deleted: bool) -> Self {
        if deleted {
            TaskStatus::Deleted
        } else {
            TaskStatus::Active
        }
    }

    pub fn is_deleted(self) -> bool {
        self == TaskStatus::Deleted
    }
}

/// A persisted task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub points: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: TaskStatus,
}

/// Input for creating a task. `points: None` means "use the default of 0".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    pub points: Option<i64>,
    pub notes: Option<String>,
}

impl NewTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn points(mut self, points: i64) -> Self {
        self.points = Some(points);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Check the task invariants and return the trimmed name and resolved points.
    pub fn validate(&self) -> Result<(String, i64), ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let points = self.points.unwrap_or(0);
        validate_points(points)?;
        Ok((name.to_string(), points))
    }
}

pub fn validate_points(points: i64) -> Result<(), ValidationError> {
    if points < 0 {
        return Err(ValidationError::NegativePoints(points));
    }
    Ok(())
}
