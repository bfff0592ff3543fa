use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::utils::audit_timestamp;

/// Body of `POST /task`. All fields are request-scoped; nothing here is
/// retained after the request finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreationRequest {
    pub task_name: String,
    pub task_desc: String,
    pub due_date_time: DateTime<Utc>,
    pub sub_group_id: i64,
    pub user_id: i64,
    pub username: String,
    pub assigned_to: Vec<Assignee>,
}

/// One task assignee. `task_id` is 0 until the remote create call has
/// allocated an id; the orchestrator stamps the real id in before assign.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignee {
    #[serde(default)]
    pub task_id: i64,
    pub assignee_user_id: i64,
    pub assignee_username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    #[serde(rename = "Create Task")]
    CreateTask,
    #[serde(rename = "Error in Create Task")]
    ErrorInCreateTask,
}

/// Transient audit payload published on the log routing key. Never stored
/// locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub user_id: i64,
    pub sub_group_id: i64,
    pub task_id: i64,
    #[serde(rename = "type")]
    pub kind: AuditEventType,
    pub description: String,
    pub timestamp: String,
}

impl AuditEvent {
    pub fn created(request: &TaskCreationRequest, task_id: i64) -> Self {
        Self {
            user_id: request.user_id,
            sub_group_id: request.sub_group_id,
            task_id,
            kind: AuditEventType::CreateTask,
            description: "Task created successfully".to_string(),
            timestamp: audit_timestamp(),
        }
    }

    /// `task_id` is 0 when the create call itself failed, or the real id
    /// when assign failed after a successful create.
    pub fn failed(request: &TaskCreationRequest, task_id: i64, description: String) -> Self {
        Self {
            user_id: request.user_id,
            sub_group_id: request.sub_group_id,
            task_id,
            kind: AuditEventType::ErrorInCreateTask,
            description,
            timestamp: audit_timestamp(),
        }
    }
}

/// Transient notification payload published on the notification routing
/// key. Schema is independent from [`AuditEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl NotificationEvent {
    pub fn new_task(recipient: String, request: &TaskCreationRequest, task_id: i64) -> Self {
        let assignees = request
            .assigned_to
            .iter()
            .map(|a| a.assignee_username.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            recipient,
            subject: "New Task Alert".to_string(),
            body: format!(
                "Task \"{}\" (#{}) was created and assigned to {}.",
                request.task_name, task_id, assignees
            ),
        }
    }
}

/// 201 body for a successful create.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreatedResponse {
    pub message: String,
    pub task_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> TaskCreationRequest {
        serde_json::from_value(json!({
            "taskName": "Write report",
            "taskDesc": "Quarterly summary",
            "dueDateTime": "2024-06-01T10:00:00Z",
            "subGroupId": 7,
            "userId": 3,
            "username": "alice",
            "assignedTo": [
                { "assigneeUserId": 5, "assigneeUsername": "bob" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn request_parses_camel_case_and_defaults_assignee_task_id() {
        let req = request();
        assert_eq!(req.task_name, "Write report");
        assert_eq!(req.sub_group_id, 7);
        assert_eq!(req.assigned_to.len(), 1);
        assert_eq!(req.assigned_to[0].task_id, 0);
        assert_eq!(req.assigned_to[0].assignee_username, "bob");
    }

    #[test]
    fn audit_event_serializes_wire_names() {
        let event = AuditEvent::created(&request(), 42);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "Create Task");
        assert_eq!(value["taskId"], 42);
        assert_eq!(value["userId"], 3);
        assert_eq!(value["subGroupId"], 7);
        assert!(value["timestamp"].as_str().unwrap().ends_with("+08:00"));
    }

    #[test]
    fn failed_audit_event_keeps_partial_task_id() {
        let event = AuditEvent::failed(&request(), 42, "Invalid subGroupId".to_string());
        assert_eq!(event.kind, AuditEventType::ErrorInCreateTask);
        assert_eq!(event.task_id, 42);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "Error in Create Task");
        assert_eq!(value["description"], "Invalid subGroupId");
    }

    #[test]
    fn notification_event_names_every_assignee() {
        let mut req = request();
        req.assigned_to.push(Assignee {
            task_id: 0,
            assignee_user_id: 6,
            assignee_username: "carol".to_string(),
        });
        let event = NotificationEvent::new_task("team@example.com".to_string(), &req, 42);
        assert!(event.body.contains("bob, carol"));
        assert!(event.body.contains("#42"));
    }
}
