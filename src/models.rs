use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// User profile as returned by /me and the auth endpoints
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub premium_expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Other(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Other(s) => s,
        }
    }

    pub fn is_completed(&self) -> bool {
        *self == TaskStatus::Completed
    }

    /// The checkbox in the task list only flips between pending and completed.
    pub fn toggled(&self) -> TaskStatus {
        if self.is_completed() {
            TaskStatus::Pending
        } else {
            TaskStatus::Completed
        }
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" | "" => TaskStatus::Pending,
            "in_progress" => TaskStatus::InProgress,
            "completed" => TaskStatus::Completed,
            "cancelled" => TaskStatus::Cancelled,
            _ => TaskStatus::Other(s),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: i32,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminder_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub labels: Vec<Label>,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Label {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

// The server sends "" for unset optional strings.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

#[derive(Deserialize, Debug)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Deserialize, Debug, Default)]
pub struct CheckoutSession {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug)]
pub struct CheckoutRequest<'a> {
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub label_ids: Vec<String>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        NewTask {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Partial update; only the fields that are set are sent.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_ids: Option<Vec<String>>,
}

impl TaskUpdate {
    pub fn status(status: TaskStatus) -> Self {
        TaskUpdate {
            status: Some(status),
            ..Default::default()
        }
    }
}

#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct NewProject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_from_server_payload() {
        let payload = json!({
            "id": "t1",
            "title": "Write report",
            "description": "",
            "project_id": "",
            "user_id": "u1",
            "priority": 2,
            "status": "pending",
            "progress": 0,
            "created_at": "2026-10-18T08:00:00Z",
            "updated_at": "2026-10-18T08:00:00Z"
        });
        let task: Task = serde_json::from_value(payload).unwrap();
        assert_eq!(task.description, None);
        assert_eq!(task.project_id, None);
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.labels.is_empty());
        assert!(task.due_date.is_none());
    }

    #[test]
    fn test_unknown_status_is_preserved() {
        let status: TaskStatus = serde_json::from_value(json!("blocked")).unwrap();
        assert_eq!(status, TaskStatus::Other("blocked".to_string()));
        assert_eq!(serde_json::to_value(&status).unwrap(), json!("blocked"));
    }

    #[test]
    fn test_toggle_twice_returns_to_pending() {
        let status = TaskStatus::Pending;
        assert_eq!(status.toggled(), TaskStatus::Completed);
        assert_eq!(status.toggled().toggled(), TaskStatus::Pending);
    }

    #[test]
    fn test_in_progress_toggles_to_completed() {
        assert_eq!(TaskStatus::InProgress.toggled(), TaskStatus::Completed);
    }

    #[test]
    fn test_update_sends_only_set_fields() {
        let body = serde_json::to_value(TaskUpdate::status(TaskStatus::Completed)).unwrap();
        assert_eq!(body, json!({ "status": "completed" }));
    }

    #[test]
    fn test_new_task_omits_empty_fields() {
        let body = serde_json::to_value(NewTask::titled("Buy milk")).unwrap();
        assert_eq!(body, json!({ "title": "Buy milk" }));
    }

    #[test]
    fn test_user_premium_expiry() {
        let user: User = serde_json::from_value(json!({
            "id": "u1",
            "email": "a@example.com",
            "is_premium": true,
            "premium_expires_at": "2027-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(user.is_premium);
        assert!(user.premium_expires_at.is_some());
    }
}
