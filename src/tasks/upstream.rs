use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use log::warn;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::UpstreamConfig;
use crate::tasks::types::{Assignee, TaskCreationRequest};

/// Closed error type produced at the client boundary. The orchestrator only
/// ever matches on these three shapes; ad-hoc upstream error bodies never
/// leak past this module.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    /// Network failure, timeout, or a response body that did not parse.
    #[error("Internal Server Error")]
    Unavailable,
    /// Upstream returned a structured error payload.
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error("{0}")]
    Other(String),
}

impl UpstreamError {
    pub fn audit_description(&self) -> String {
        self.to_string()
    }
}

impl IntoResponse for UpstreamError {
    fn into_response(self) -> Response {
        match self {
            UpstreamError::Unavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal Server Error" })),
            )
                .into_response(),
            UpstreamError::Http { status, message } => {
                let reason = status.canonical_reason().unwrap_or("Unknown");
                (
                    status,
                    Json(json!({
                        "code": format!("{} {}", status.as_u16(), reason),
                        "error": message,
                    })),
                )
                    .into_response()
            }
            UpstreamError::Other(raw) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": raw })),
            )
                .into_response(),
        }
    }
}

#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn create(&self, request: &TaskCreationRequest) -> Result<i64, UpstreamError>;
    async fn assign(
        &self,
        task_id: i64,
        assignees: &[Assignee],
        assignor_id: i64,
        assignor_username: &str,
    ) -> Result<(), UpstreamError>;
}

/// Subgroup member reshaped into the assignee vocabulary the task flow
/// expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgroupMember {
    pub assignee_user_id: i64,
    pub assignee_username: String,
}

#[async_trait]
pub trait SubgroupApi: Send + Sync {
    async fn members(&self, sub_group_id: i64) -> Result<Vec<SubgroupMember>, UpstreamError>;
}

#[derive(Deserialize)]
struct UpstreamErrorBody {
    #[serde(rename = "Result")]
    result: UpstreamErrorResult,
}

#[derive(Deserialize)]
struct UpstreamErrorResult {
    #[serde(rename = "ErrorMessage")]
    error_message: String,
}

/// Classify a non-success upstream response: a parseable error envelope
/// keeps its status and message, anything else is Unavailable.
async fn classify(response: reqwest::Response) -> UpstreamError {
    let status = response.status();
    match response.json::<UpstreamErrorBody>().await {
        Ok(body) => UpstreamError::Http {
            status,
            message: body.result.error_message,
        },
        Err(_) => UpstreamError::Unavailable,
    }
}

pub struct TaskApiClient {
    client: Client,
    config: UpstreamConfig,
}

#[derive(Deserialize)]
struct CreateTaskBody {
    #[serde(rename = "TaskId")]
    task_id: i64,
}

impl TaskApiClient {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl TaskApi for TaskApiClient {
    async fn create(&self, request: &TaskCreationRequest) -> Result<i64, UpstreamError> {
        let response = self
            .client
            .post(format!("{}/task", self.config.task_api_url))
            .header("X-Task-AppId", &self.config.task_app_id)
            .header("X-Task-Key", &self.config.task_key)
            .timeout(self.config.timeout)
            .json(&json!({
                "name": request.task_name,
                "description": request.task_desc,
                "dueDateTime": request.due_date_time,
                "subGroupId": request.sub_group_id,
                "createdById": request.user_id,
                "createdByUsername": request.username,
            }))
            .send()
            .await
            .map_err(|err| {
                warn!("task create call failed: {}", err);
                UpstreamError::Unavailable
            })?;
        if !response.status().is_success() {
            return Err(classify(response).await);
        }
        let body: CreateTaskBody = response
            .json()
            .await
            .map_err(|_| UpstreamError::Unavailable)?;
        Ok(body.task_id)
    }

    async fn assign(
        &self,
        task_id: i64,
        assignees: &[Assignee],
        assignor_id: i64,
        assignor_username: &str,
    ) -> Result<(), UpstreamError> {
        let response = self
            .client
            .put(format!("{}/task/assign/{}", self.config.task_api_url, task_id))
            .header("X-Task-AppId", &self.config.task_app_id)
            .header("X-Task-Key", &self.config.task_key)
            .header("assignorId", assignor_id.to_string())
            .header("assignorUsername", assignor_username)
            .timeout(self.config.timeout)
            .json(assignees)
            .send()
            .await
            .map_err(|err| {
                warn!("task assign call failed: {}", err);
                UpstreamError::Unavailable
            })?;
        if !response.status().is_success() {
            return Err(classify(response).await);
        }
        Ok(())
    }
}

pub struct SubgroupApiClient {
    client: Client,
    config: UpstreamConfig,
}

#[derive(Deserialize)]
struct SubgroupEnvelope {
    #[serde(rename = "SubGroup")]
    sub_group: SubgroupBody,
}

#[derive(Deserialize)]
struct SubgroupBody {
    #[serde(rename = "subGroupUsers")]
    sub_group_users: Vec<SubgroupUser>,
}

#[derive(Deserialize)]
struct SubgroupUser {
    #[serde(rename = "userId")]
    user_id: i64,
    username: String,
}

impl SubgroupApiClient {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl SubgroupApi for SubgroupApiClient {
    async fn members(&self, sub_group_id: i64) -> Result<Vec<SubgroupMember>, UpstreamError> {
        let response = self
            .client
            .get(format!(
                "{}/subgroup/{}",
                self.config.subgroup_api_url, sub_group_id
            ))
            .header("X-SubGroup-AppId", &self.config.subgroup_app_id)
            .header("X-SubGroup-Key", &self.config.subgroup_key)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|err| {
                warn!("subgroup lookup failed: {}", err);
                UpstreamError::Unavailable
            })?;
        if !response.status().is_success() {
            return Err(classify(response).await);
        }
        let envelope: SubgroupEnvelope = response
            .json()
            .await
            .map_err(|_| UpstreamError::Unavailable)?;
        Ok(envelope
            .sub_group
            .sub_group_users
            .into_iter()
            .map(|user| SubgroupMember {
                assignee_user_id: user.user_id,
                assignee_username: user.username,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(base: &str) -> UpstreamConfig {
        UpstreamConfig {
            task_api_url: base.to_string(),
            task_app_id: "task-app".to_string(),
            task_key: "task-key".to_string(),
            subgroup_api_url: base.to_string(),
            subgroup_app_id: "grp-app".to_string(),
            subgroup_key: "grp-key".to_string(),
            timeout: Duration::from_secs(2),
        }
    }

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

    #[tokio::test]
    async fn create_sends_identity_headers_and_parses_task_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/task")
            .match_header("x-task-appid", "task-app")
            .match_header("x-task-key", "task-key")
            .match_body(mockito::Matcher::PartialJson(json!({
                "name": "Write report",
                "subGroupId": 7,
                "createdById": 3,
                "createdByUsername": "alice",
            })))
            .with_status(200)
            .with_body(r#"{"TaskId": 42}"#)
            .create_async()
            .await;

        let client = TaskApiClient::new(config(&server.url()));
        let task_id = client.create(&request()).await.unwrap();
        assert_eq!(task_id, 42);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_maps_structured_error_to_http() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/task")
            .with_status(400)
            .with_body(r#"{"Result":{"ErrorMessage":"Invalid subGroupId"}}"#)
            .create_async()
            .await;

        let client = TaskApiClient::new(config(&server.url()));
        let err = client.create(&request()).await.unwrap_err();
        match err {
            UpstreamError::Http { status, message } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "Invalid subGroupId");
            }
            other => panic!("expected Http error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn create_maps_unparseable_error_body_to_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/task")
            .with_status(502)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let client = TaskApiClient::new(config(&server.url()));
        let err = client.create(&request()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Unavailable));
    }

    #[tokio::test]
    async fn create_maps_connection_failure_to_unavailable() {
        let client = TaskApiClient::new(config("http://127.0.0.1:1"));
        let err = client.create(&request()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Unavailable));
    }

    #[tokio::test]
    async fn assign_attaches_actor_identity_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/task/assign/42")
            .match_header("x-task-appid", "task-app")
            .match_header("assignorid", "3")
            .match_header("assignorusername", "alice")
            .match_body(mockito::Matcher::Json(json!([
                { "taskId": 42, "assigneeUserId": 5, "assigneeUsername": "bob" }
            ])))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = TaskApiClient::new(config(&server.url()));
        let assignees = vec![Assignee {
            task_id: 42,
            assignee_user_id: 5,
            assignee_username: "bob".to_string(),
        }];
        client.assign(42, &assignees, 3, "alice").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn subgroup_members_are_reshaped() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/subgroup/7")
            .match_header("x-subgroup-appid", "grp-app")
            .match_header("x-subgroup-key", "grp-key")
            .with_status(200)
            .with_body(
                r#"{"SubGroup":{"subGroupUsers":[
                    {"userId": 5, "username": "bob"},
                    {"userId": 6, "username": "carol"}
                ]}}"#,
            )
            .create_async()
            .await;

        let client = SubgroupApiClient::new(config(&server.url()));
        let members = client.members(7).await.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].assignee_user_id, 5);
        assert_eq!(members[0].assignee_username, "bob");
        let value = serde_json::to_value(&members).unwrap();
        assert_eq!(value[1]["assigneeUserId"], 6);
        assert!(value[1].get("userId").is_none());
    }

    #[tokio::test]
    async fn subgroup_malformed_body_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/subgroup/7")
            .with_status(200)
            .with_body(r#"{"unexpected": true}"#)
            .create_async()
            .await;

        let client = SubgroupApiClient::new(config(&server.url()));
        let err = client.members(7).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Unavailable));
    }
}
