use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Postponed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Postponed => "postponed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "postponed" => Some(Self::Postponed),
            _ => None,
        }
    }

    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }
}

/// A team task with its most recent submission joined in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub team_id: Uuid,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
    pub updated_at: DateTime<Utc>,
    pub latest_submission_at: Option<DateTime<Utc>>,
    pub latest_submission_text: Option<String>,
}

/// One submission row. Several rows for the same task mean the work was resubmitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub task_id: Uuid,
    pub submitted_by: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub submission_text: Option<String>,
}
