//! Task record types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a task. A record is created `Pending` and
/// transitions exactly once to one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One tracked task, generic over the result payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord<T> {
    pub id: String,
    pub status: TaskStatus,
    /// What started this task, e.g. `"send_command:dev123"`.
    pub trigger: String,
    pub started_at: DateTime<Utc>,
    /// Derived from the persistent tier's remaining TTL at read time;
    /// never stored.
    #[serde(skip)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration_seconds: Option<f64>,
    /// No `default` attribute: it would require `T: Default` for
    /// deserialization, and serde already reads a missing `Option` field
    /// as `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub http_status_code: Option<u16>,
}

impl<T> TaskRecord<T> {
    /// A fresh pending record started now.
    pub fn pending(id: impl Into<String>, trigger: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Pending,
            trigger: trigger.into(),
            started_at: Utc::now(),
            expires_at: None,
            duration_seconds: None,
            result: None,
            error: None,
            http_status_code: None,
        }
    }
}
