//! Domain types shared across the workspace.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Task lifecycle status. `pending` is the scanner's overdue marker: tasks
/// past their due date are parked here until resolved or re-dated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    Pending,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }

    /// Glyph used in status-change emails.
    pub fn emoji(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "📝",
            TaskStatus::Pending => "⏳",
            TaskStatus::InProgress => "🔄",
            TaskStatus::Done => "✅",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = crate::error::TaskHiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(crate::error::TaskHiveError::Validation(format!(
                "Unknown task status: '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User role. Team leads own projects and manage tasks; developers act on
/// tasks assigned to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    TeamLead,
    Developer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::TeamLead => "team_lead",
            UserRole::Developer => "developer",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = crate::error::TaskHiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "team_lead" => Ok(UserRole::TeamLead),
            "developer" => Ok(UserRole::Developer),
            other => Err(crate::error::TaskHiveError::Validation(format!(
                "Unknown user role: '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user account. The password hash never leaves the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    #[serde(default)]
    pub password_hash: String,
    pub role: UserRole,
}

/// A project owned by a team lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: i64,
}

/// A task within a project, optionally assigned to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    pub project_id: i64,
    pub assigned_user_id: Option<i64>,
}

impl Task {
    /// Whether the task is past its due date on the given day.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        matches!(self.due_date, Some(due) if due < today)
    }
}

/// A queued outgoing email. Transient: exists only between enqueue and the
/// delivery attempt, and is dropped afterwards whatever the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailJob {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Payload for creating a task.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskCreate {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub project_id: i64,
    #[serde(default)]
    pub assigned_user_id: Option<i64>,
}

/// Closed set of updatable task fields. Unknown keys are rejected outright;
/// double-Option fields distinguish "absent" from "explicit null" so a patch
/// can unassign a task or clear a due date.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default, with = "double_option")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default, with = "double_option")]
    pub assigned_user_id: Option<Option<i64>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.due_date.is_none()
            && self.project_id.is_none()
            && self.assigned_user_id.is_none()
    }
}

/// Payload for creating a project.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Closed set of updatable project fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, with = "double_option")]
    pub description: Option<Option<String>>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

/// Serde helper: a missing field stays `None`, an explicit `null` becomes
/// `Some(None)`, a value becomes `Some(Some(v))`.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
